use crate::{
    config::DEFAULT_COMPONENT_WIDTH,
    cursor::Slice,
    error::InternalError,
    index::{IndexEntry, Indexer, PathBound, invalid_bounds},
    lex::{encode_value, resize},
    range::Chunk,
    value::{FieldValues, Value},
};
use std::{marker::PhantomData, ops::Bound};

///
/// TagIndexer
///
/// One flat key per value of every field listed by
/// `FieldValues::indexed_fields` (`#[field(index)]` on derived types):
/// `name ∥ 0x00 ∥ kind tag ∥ value`, values padded to a fixed width.
///

pub struct TagIndexer<T> {
    default_width: usize,
    _marker: PhantomData<fn(&T)>,
}

impl<T: FieldValues> TagIndexer<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_width: DEFAULT_COMPONENT_WIDTH,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn with_default_width(mut self, width: usize) -> Self {
        self.default_width = width;
        self
    }

    fn namespace(field: &str) -> Vec<u8> {
        let mut out = field.as_bytes().to_vec();
        out.push(0x00);
        out
    }

    /// Index key of `value` under `field`.
    pub fn field_key(&self, field: &str, value: &Value) -> Result<Vec<u8>, InternalError> {
        let kind = value.kind();
        let width = kind.fixed_width().unwrap_or(self.default_width);

        let mut key = Self::namespace(field);
        key.push(kind.tag());
        key.extend(resize(&encode_value(value)?, width));

        Ok(key)
    }
}

impl<T: FieldValues> Default for TagIndexer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FieldValues> Indexer<T> for TagIndexer<T> {
    fn index(&self, record: &T, _is_set: bool) -> Result<Vec<IndexEntry>, InternalError> {
        let mut entries = Vec::new();

        for field in T::indexed_fields() {
            let Some(value) = record.get_value(field) else {
                continue;
            };
            for element in value.elements() {
                entries.push(IndexEntry::new(self.field_key(field, element)?));
            }
        }

        Ok(entries)
    }

    fn lookup(&self, bounds: &[PathBound]) -> Result<Slice<Chunk>, InternalError> {
        let [bound] = bounds else {
            return Err(invalid_bounds("tag index lookups take exactly one bound"));
        };
        if !T::indexed_fields().contains(&bound.path.as_str()) {
            return Err(invalid_bounds(format!("unknown path '{}'", bound.path)));
        }

        if let Some(value) = bound.point() {
            return Ok(Slice::new(vec![Chunk::point(self.field_key(&bound.path, value)?)]));
        }

        let kinds: Vec<_> = [&bound.low, &bound.high]
            .into_iter()
            .filter_map(|b| match b {
                Bound::Included(v) | Bound::Excluded(v) => Some(v.kind()),
                Bound::Unbounded => None,
            })
            .collect();
        let kind = match kinds.as_slice() {
            [] => return Ok(Slice::new(vec![Chunk::prefix(Self::namespace(&bound.path))])),
            [kind] => *kind,
            [low, high] if low == high => *low,
            _ => return Err(invalid_bounds("range bounds must share one kind")),
        };

        let mut bucket = Self::namespace(&bound.path);
        bucket.push(kind.tag());

        let encode = |b: &Bound<Value>| -> Result<Bound<Vec<u8>>, InternalError> {
            Ok(match b {
                Bound::Unbounded => Bound::Included(bucket.clone()),
                Bound::Included(v) => Bound::Included(self.field_key(&bound.path, v)?),
                Bound::Excluded(v) => Bound::Excluded(self.field_key(&bound.path, v)?),
            })
        };
        let chunk = Chunk::new(encode(&bound.low)?, encode(&bound.high)?);

        Ok(Slice::new(vec![chunk]))
    }
}
