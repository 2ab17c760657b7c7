use crate::{
    cursor::Slice,
    error::InternalError,
    index::{IndexEntry, Indexer, PathBound},
    range::Chunk,
    serialize::{deserialize, serialize},
    value::{FieldValues, Value},
};
use std::collections::BTreeMap;

/// Field values carried in an index entry written by [`ValueInjector`].
pub type InjectedValues = BTreeMap<String, Value>;

///
/// ValueInjector
///
/// Wraps an indexer and stores a selection of record fields as the value of
/// every index entry it produces, so scans can answer from the index alone.
///

pub struct ValueInjector<I> {
    inner: I,
    fields: Vec<String>,
}

impl<I> ValueInjector<I> {
    #[must_use]
    pub fn new(inner: I, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            inner,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl<T, I> Indexer<T> for ValueInjector<I>
where
    T: FieldValues,
    I: Indexer<T>,
{
    fn index(&self, record: &T, is_set: bool) -> Result<Vec<IndexEntry>, InternalError> {
        let mut entries = self.inner.index(record, is_set)?;
        if !is_set {
            return Ok(entries);
        }

        let injected: InjectedValues = self
            .fields
            .iter()
            .filter_map(|f| record.get_value(f).map(|v| (f.clone(), v)))
            .collect();
        let payload = serialize(&injected)?;
        for entry in &mut entries {
            entry.value = Some(payload.clone());
        }

        Ok(entries)
    }

    fn lookup(&self, bounds: &[PathBound]) -> Result<Slice<Chunk>, InternalError> {
        self.inner.lookup(bounds)
    }
}

/// Decode the value of an index entry written by [`ValueInjector`].
pub fn decode_injected(bytes: &[u8]) -> Result<InjectedValues, InternalError> {
    Ok(deserialize(bytes)?)
}
