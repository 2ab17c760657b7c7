//! Module: index
//! Responsibility: secondary indexes. Indexers turn a record into index
//! keys and turn path bounds into chunks; `IndexExtension` keeps a ref store
//! of `index key ∥ record key` entries in step with the record store.
//! Does not own: chunk scanning (see `range`) or dispatch (see `ext`).
//!
//! Invariants:
//! - An index entry's ref prefix is the index key and its key part is the
//!   record key, so a chunk over index keys scans straight to record keys.
//! - Re-indexing a record removes the entries of its previous value first.

mod concat;
mod inject;
mod tag;

#[cfg(test)]
mod tests;

use crate::{
    cursor::{BoxCursor, Cursor, CursorExt, Lookup, Slice, collect_pairs},
    error::{ErrorOrigin, InternalError},
    ext::{ExtContext, ExtStore, Extension, SetOptions},
    kv::{IteratorOptions, Transaction},
    range::{Chunk, RangeCursor, scan},
    reference::{RefEntry, RefInstance, RefItem, RefStore},
    value::{FieldValue, Value},
};
use std::{fmt, ops::Bound, sync::Arc};

pub use concat::{Component, ConcatIndexer};
pub use inject::{InjectedValues, ValueInjector, decode_injected};
pub use tag::TagIndexer;

pub(crate) fn invalid_bounds(message: impl Into<String>) -> InternalError {
    InternalError::invalid_argument(ErrorOrigin::Index, message)
}

///
/// IndexEntry
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexEntry {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

impl IndexEntry {
    #[must_use]
    pub const fn new(key: Vec<u8>) -> Self {
        Self { key, value: None }
    }

    #[must_use]
    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = Some(value);
        self
    }
}

///
/// PathBound
///
/// Bounds on one field path, in value space.
///

#[derive(Clone, Debug, PartialEq)]
pub struct PathBound {
    pub path: String,
    pub low: Bound<Value>,
    pub high: Bound<Value>,
}

impl PathBound {
    #[must_use]
    pub fn range(path: impl Into<String>, low: Bound<Value>, high: Bound<Value>) -> Self {
        Self {
            path: path.into(),
            low,
            high,
        }
    }

    #[must_use]
    pub fn eq(path: impl Into<String>, value: impl FieldValue) -> Self {
        let value = value.to_value();
        Self::range(path, Bound::Included(value.clone()), Bound::Included(value))
    }

    #[must_use]
    pub fn gt(path: impl Into<String>, value: impl FieldValue) -> Self {
        Self::range(path, Bound::Excluded(value.to_value()), Bound::Unbounded)
    }

    #[must_use]
    pub fn ge(path: impl Into<String>, value: impl FieldValue) -> Self {
        Self::range(path, Bound::Included(value.to_value()), Bound::Unbounded)
    }

    #[must_use]
    pub fn lt(path: impl Into<String>, value: impl FieldValue) -> Self {
        Self::range(path, Bound::Unbounded, Bound::Excluded(value.to_value()))
    }

    #[must_use]
    pub fn le(path: impl Into<String>, value: impl FieldValue) -> Self {
        Self::range(path, Bound::Unbounded, Bound::Included(value.to_value()))
    }

    /// The single value when both bounds include the same value.
    #[must_use]
    pub fn point(&self) -> Option<&Value> {
        match (&self.low, &self.high) {
            (Bound::Included(low), Bound::Included(high)) if low == high => Some(low),
            _ => None,
        }
    }
}

///
/// Indexer
///

pub trait Indexer<T>: Send + Sync {
    /// Index entries for `record`; `is_set` is false when the entries are
    /// being removed.
    fn index(&self, record: &T, is_set: bool) -> Result<Vec<IndexEntry>, InternalError>;

    /// Chunks over index keys matching `bounds`.
    fn lookup(&self, bounds: &[PathBound]) -> Result<Slice<Chunk>, InternalError> {
        let _ = bounds;
        Err(InternalError::unsupported(
            ErrorOrigin::Index,
            "indexer does not support lookups",
        ))
    }
}

///
/// Index
///
/// A named indexer attached to an extensible store.
///

pub struct Index<T> {
    name: String,
    indexer: Arc<dyn Indexer<T>>,
    unique: bool,
}

impl<T: 'static> Index<T> {
    #[must_use]
    pub fn new(name: impl Into<String>, indexer: impl Indexer<T> + 'static) -> Self {
        Self {
            name: name.into(),
            indexer: Arc::new(indexer),
            unique: false,
        }
    }

    /// Reject a second record under an existing index key.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    #[must_use]
    pub fn indexer(&self) -> &Arc<dyn Indexer<T>> {
        &self.indexer
    }

    /// The extension maintaining this index.
    #[must_use]
    pub fn extension(&self) -> Arc<dyn Extension<T>> {
        Arc::new(IndexExtension {
            name: self.name.clone(),
            indexer: Arc::clone(&self.indexer),
            unique: self.unique,
        })
    }

    /// Register the index on an empty store; use
    /// [`ExtInstance::add_extension`](crate::ext::ExtInstance::add_extension)
    /// with [`Index::extension`] to backfill a populated one.
    pub fn install(&self, store: &ExtStore<T>) -> Result<(), InternalError> {
        store.register(self.name.clone(), self.extension())
    }

    pub fn refs(&self, store: &ExtStore<T>) -> Result<RefStore, InternalError> {
        Ok(RefStore::new(store.extension_store(&self.name)?))
    }

    /// Cursor over matching entries: key is the index key, value the record
    /// key.
    pub fn lookup<'a>(
        &self,
        store: &ExtStore<T>,
        txn: &'a dyn Transaction,
        bounds: &[PathBound],
        reverse: bool,
    ) -> Result<RangeCursor<'a>, InternalError> {
        let chunks = self.indexer.lookup(bounds)?;
        let refs = self.refs(store)?.instance(txn);

        Ok(scan(&refs, chunks, reverse))
    }

    /// Matching records keyed by record key, fetched lazily.
    pub fn lookup_records<'a>(
        &self,
        store: &ExtStore<T>,
        txn: &'a dyn Transaction,
        bounds: &[PathBound],
        reverse: bool,
    ) -> Result<BoxCursor<'a, Vec<u8>, T, [u8]>, InternalError>
    where
        T: Clone,
    {
        let data = store.data().instance(txn);
        let hits = self.lookup(store, txn, bounds, reverse)?;

        Ok(Lookup::new(hits, move |key: &Vec<u8>| data.get(key)).boxed())
    }

    /// Matching entries with their stored values, for index-only reads.
    pub fn lookup_entries(
        &self,
        store: &ExtStore<T>,
        txn: &dyn Transaction,
        bounds: &[PathBound],
        reverse: bool,
    ) -> Result<Vec<RefItem>, InternalError> {
        let mut hits = self.lookup(store, txn, bounds, reverse)?;
        let mut out = Vec::new();

        hits.rewind();
        while hits.valid() {
            let prefix = hits.key()?;
            let key = hits.value()?;
            let value = hits
                .item()
                .map(|item| item.value.clone())
                .filter(|v| !v.is_empty());
            out.push(RefItem { prefix, key, value });
            hits.next();
        }
        hits.status()?;
        hits.close();

        Ok(out)
    }
}

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            indexer: Arc::clone(&self.indexer),
            unique: self.unique,
        }
    }
}

impl<T> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .finish_non_exhaustive()
    }
}

///
/// IndexExtension
///

struct IndexExtension<T> {
    name: String,
    indexer: Arc<dyn Indexer<T>>,
    unique: bool,
}

impl<T> IndexExtension<T> {
    fn refs<'a>(ctx: &ExtContext<'a>) -> RefInstance<'a> {
        RefStore::new(ctx.store().clone()).instance(ctx.txn())
    }

    fn remove(&self, refs: &RefInstance<'_>, key: &[u8], value: &T) -> Result<(), InternalError> {
        for entry in self.indexer.index(value, false)? {
            refs.delete_ref(&entry.key, key)?;
        }

        Ok(())
    }

    fn check_unique(
        &self,
        refs: &RefInstance<'_>,
        index_key: &[u8],
        key: &[u8],
    ) -> Result<(), InternalError> {
        let taken = collect_pairs(&mut refs.new_iterator(&IteratorOptions::prefix(index_key)))?
            .into_iter()
            .any(|(prefix, owner)| prefix == index_key && owner != key);

        if taken {
            return Err(InternalError::conflict(
                ErrorOrigin::Index,
                format!("unique index '{}' already holds this key", self.name),
            ));
        }

        Ok(())
    }
}

impl<T> Extension<T> for IndexExtension<T> {
    fn on_set(
        &self,
        ctx: &ExtContext<'_>,
        key: &[u8],
        old: Option<&T>,
        new: &T,
        _opts: &SetOptions,
    ) -> Result<(), InternalError> {
        let refs = Self::refs(ctx);
        if let Some(old) = old {
            self.remove(&refs, key, old)?;
        }

        for entry in self.indexer.index(new, true)? {
            if self.unique {
                self.check_unique(&refs, &entry.key, key)?;
            }

            let mut link = RefEntry::new(entry.key);
            link.value = entry.value;
            refs.set(key, link)?;
        }

        Ok(())
    }

    fn on_delete(&self, ctx: &ExtContext<'_>, key: &[u8], value: &T) -> Result<(), InternalError> {
        self.remove(&Self::refs(ctx), key, value)
    }
}
