//! Module: record
//! Responsibility: typed-id record stores over the extensible store: id
//! assignment, id encoding, index lookups and predicate queries that hand
//! back records with their id populated.
//! Does not own: the write pipeline (see `ext`) or relations (see `relation`).
//!
//! Invariants:
//! - A record's data key is the encoding of its id under the store's
//!   id codec; records read back always carry that id.
//! - A zero id is replaced from the id source before the write, or the write
//!   fails with `InvalidArgument`.

mod id;

#[cfg(test)]
mod tests;

use crate::{
    config::StackConfig,
    cursor::{BoxCursor, Cursor, CursorExt},
    error::{ErrorOrigin, InternalError},
    ext::{ExtInstance, ExtStore, Extension, SetOptions},
    index::{Index, PathBound},
    kv::{Database, IteratorOptions, Transaction},
    query::{ExprEngine, FieldExprEngine},
    registry::NameRegistry,
    serialize::{CborCodec, Codec},
    store::PrefixStore,
    value::{Document, FieldValues, Value},
};
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fmt,
    ops::Bound,
    sync::{Arc, Weak},
};

pub use id::{FnIds, IdCodec, IdSource, IdentityError, LexIdCodec, RecordId, SequenceIds};

/// Cursor over records keyed by id; `seek` takes encoded id bytes.
pub type RecordCursor<'a, R> = BoxCursor<'a, <R as Record>::Id, R, [u8]>;

///
/// Record
///

pub trait Record: Clone + 'static {
    type Id: RecordId;

    fn id(&self) -> Self::Id;

    fn set_id(&mut self, id: Self::Id);
}

impl Record for Document {
    type Id = String;

    fn id(&self) -> String {
        self.get(Self::ID_FIELD)
            .and_then(Value::as_text)
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    fn set_id(&mut self, id: String) {
        self.set(Self::ID_FIELD, id);
    }
}

type SourceFactory<I> = Box<dyn FnOnce(u64) -> Result<Arc<dyn IdSource<I>>, InternalError>>;

enum CodecChoice<R> {
    /// CBOR bounded by the configured `max_value_bytes`.
    Cbor(fn(usize) -> Arc<dyn Codec<R>>),
    Custom(Arc<dyn Codec<R>>),
}

fn cbor_codec<R>(max_bytes: usize) -> Arc<dyn Codec<R>>
where
    R: Serialize + DeserializeOwned + 'static,
{
    Arc::new(CborCodec::with_max_bytes(max_bytes))
}

///
/// RecordStoreBuilder
///

pub struct RecordStoreBuilder<R: Record> {
    root: PrefixStore,
    codec: CodecChoice<R>,
    id_codec: Arc<dyn IdCodec<R::Id>>,
    id_source: Option<SourceFactory<R::Id>>,
    registry: Option<Arc<NameRegistry>>,
    extensions: Vec<(String, Arc<dyn Extension<R>>)>,
    indexes: Vec<Index<R>>,
    engine: Arc<dyn ExprEngine>,
    config: StackConfig,
}

impl<R: Record> RecordStoreBuilder<R> {
    /// Use `codec` for record values instead of CBOR.
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn Codec<R>>) -> Self {
        self.codec = CodecChoice::Custom(codec);
        self
    }

    #[must_use]
    pub fn id_codec(mut self, codec: impl IdCodec<R::Id> + 'static) -> Self {
        self.id_codec = Arc::new(codec);
        self
    }

    #[must_use]
    pub fn id_source(mut self, source: impl IdSource<R::Id> + 'static) -> Self {
        let source: Arc<dyn IdSource<R::Id>> = Arc::new(source);
        self.id_source = Some(Box::new(move |_| Ok(source)));
        self
    }

    #[must_use]
    pub fn id_fn<F>(self, f: F) -> Self
    where
        F: Fn() -> Result<R::Id, InternalError> + Send + Sync + 'static,
    {
        self.id_source(FnIds(f))
    }

    /// Assign ids from the engine sequence at `key`, leased in blocks of the
    /// configured bandwidth.
    #[must_use]
    pub fn sequence(mut self, db: Arc<dyn Database>, key: impl Into<Vec<u8>>) -> Self
    where
        R::Id: TryFrom<u64>,
    {
        let key = key.into();
        self.id_source = Some(Box::new(move |bandwidth| {
            let source: Arc<dyn IdSource<R::Id>> = Arc::new(SequenceIds::new(db, key, bandwidth)?);
            Ok(source)
        }));
        self
    }

    /// Tag extension sub-prefixes through `registry`.
    #[must_use]
    pub fn registry(mut self, registry: Arc<NameRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn extension(mut self, name: impl Into<String>, ext: Arc<dyn Extension<R>>) -> Self {
        self.extensions.push((name.into(), ext));
        self
    }

    #[must_use]
    pub fn index(mut self, index: Index<R>) -> Self {
        self.indexes.push(index);
        self
    }

    #[must_use]
    pub fn engine(mut self, engine: impl ExprEngine + 'static) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    #[must_use]
    pub fn config(mut self, config: StackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<RecordStore<R>, InternalError> {
        self.config.validate()?;

        let codec = match self.codec {
            CodecChoice::Cbor(make) => make(self.config.max_value_bytes),
            CodecChoice::Custom(codec) => codec,
        };
        let ext = match self.registry {
            Some(registry) => ExtStore::with_registry(self.root, codec, registry),
            None => ExtStore::new(self.root, codec),
        };
        for (name, extension) in self.extensions {
            ext.register(name, extension)?;
        }
        for index in &self.indexes {
            index.install(&ext)?;
        }
        let id_source = self
            .id_source
            .map(|factory| factory(self.config.sequence_bandwidth))
            .transpose()?;

        Ok(RecordStore {
            shared: Arc::new(RecordShared {
                ext,
                id_codec: self.id_codec,
                id_source,
                indexes: RwLock::new(self.indexes),
                engine: self.engine,
            }),
        })
    }
}

impl<R: Record> fmt::Debug for RecordStoreBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStoreBuilder")
            .field("root", &self.root)
            .field("indexes", &self.indexes)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct RecordShared<R: Record> {
    ext: ExtStore<R>,
    id_codec: Arc<dyn IdCodec<R::Id>>,
    id_source: Option<Arc<dyn IdSource<R::Id>>>,
    indexes: RwLock<Vec<Index<R>>>,
    engine: Arc<dyn ExprEngine>,
}

///
/// RecordStore
///
/// Store description; clones share extensions, indexes and the id source.
///

pub struct RecordStore<R: Record> {
    shared: Arc<RecordShared<R>>,
}

impl<R> RecordStore<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    /// Builder storing records as CBOR.
    #[must_use]
    pub fn builder(root: PrefixStore) -> RecordStoreBuilder<R> {
        Self::builder_with(root, CodecChoice::Cbor(cbor_codec::<R>))
    }
}

impl<R: Record> RecordStore<R> {
    /// Builder for records stored with `codec`.
    #[must_use]
    pub fn builder_with_codec(
        root: PrefixStore,
        codec: Arc<dyn Codec<R>>,
    ) -> RecordStoreBuilder<R> {
        Self::builder_with(root, CodecChoice::Custom(codec))
    }

    fn builder_with(root: PrefixStore, codec: CodecChoice<R>) -> RecordStoreBuilder<R> {
        RecordStoreBuilder {
            root,
            codec,
            id_codec: Arc::new(LexIdCodec),
            id_source: None,
            registry: None,
            extensions: Vec::new(),
            indexes: Vec::new(),
            engine: Arc::new(FieldExprEngine),
            config: StackConfig::default(),
        }
    }

    #[must_use]
    pub fn ext(&self) -> &ExtStore<R> {
        &self.shared.ext
    }

    pub fn encode_id(&self, id: &R::Id) -> Result<Vec<u8>, InternalError> {
        self.shared.id_codec.encode(id)
    }

    pub fn decode_id(&self, bytes: &[u8]) -> Result<R::Id, InternalError> {
        self.shared.id_codec.decode(bytes)
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<Index<R>> {
        self.shared
            .indexes
            .read()
            .iter()
            .find(|i| i.name() == name)
            .cloned()
    }

    /// Attach `index` to a possibly populated store, backfilling it inside
    /// `txn`; returns the number of records indexed.
    pub fn add_index(
        &self,
        txn: &dyn Transaction,
        index: Index<R>,
    ) -> Result<usize, InternalError> {
        let indexed = self
            .shared
            .ext
            .instance(txn)
            .add_extension(index.name(), index.extension())?;
        self.shared.indexes.write().push(index);

        Ok(indexed)
    }

    #[must_use]
    pub fn instance<'a>(&self, txn: &'a dyn Transaction) -> RecordInstance<'a, R> {
        RecordInstance {
            store: self.clone(),
            ext: self.shared.ext.instance(txn),
        }
    }

    /// Release the id source (returns unused sequence leases).
    pub fn close(&self) -> Result<(), InternalError> {
        match &self.shared.id_source {
            Some(source) => source.close(),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakRecordStore<R> {
        WeakRecordStore {
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn next_id(&self) -> Result<R::Id, InternalError> {
        match &self.shared.id_source {
            Some(source) => source.next_id(),
            None => Err(IdentityError::ZeroId.into()),
        }
    }
}

impl<R: Record> Clone for RecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Record> fmt::Debug for RecordStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("ext", &self.shared.ext)
            .field("indexes", &*self.shared.indexes.read())
            .finish_non_exhaustive()
    }
}

///
/// WeakRecordStore
///

pub struct WeakRecordStore<R: Record> {
    shared: Weak<RecordShared<R>>,
}

impl<R: Record> WeakRecordStore<R> {
    #[must_use]
    pub fn upgrade(&self) -> Option<RecordStore<R>> {
        self.shared.upgrade().map(|shared| RecordStore { shared })
    }
}

impl<R: Record> Clone for WeakRecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<R: Record> fmt::Debug for WeakRecordStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakRecordStore")
    }
}

///
/// RecordInstance
///

pub struct RecordInstance<'a, R: Record> {
    store: RecordStore<R>,
    ext: ExtInstance<'a, R>,
}

impl<'a, R: Record> RecordInstance<'a, R> {
    #[must_use]
    pub const fn store(&self) -> &RecordStore<R> {
        &self.store
    }

    /// The underlying extensible instance, keyed by encoded ids.
    #[must_use]
    pub const fn ext(&self) -> &ExtInstance<'a, R> {
        &self.ext
    }

    pub fn get(&self, id: &R::Id) -> Result<R, InternalError> {
        let mut record = self.ext.get(&self.store.encode_id(id)?)?;
        record.set_id(id.clone());

        Ok(record)
    }

    pub fn exists(&self, id: &R::Id) -> Result<bool, InternalError> {
        self.ext.exists(&self.store.encode_id(id)?)
    }

    /// Records for `ids` in order; `None` where an id is absent.
    pub fn get_many(&self, ids: &[R::Id]) -> Result<Vec<Option<R>>, InternalError> {
        ids.iter()
            .map(|id| match self.get(id) {
                Ok(record) => Ok(Some(record)),
                Err(err) if err.is_not_found() => Ok(None),
                Err(err) => Err(err),
            })
            .collect()
    }

    /// Store `record`, assigning an id first when it is zero; returns the id.
    pub fn set(&self, record: &mut R) -> Result<R::Id, InternalError> {
        self.set_with(record, &SetOptions::new())
    }

    pub fn set_with(&self, record: &mut R, opts: &SetOptions) -> Result<R::Id, InternalError> {
        let mut id = record.id();
        if id.is_zero() {
            id = self.store.next_id()?;
            record.set_id(id.clone());
        }

        self.ext.set_with(&self.store.encode_id(&id)?, record, opts)?;

        Ok(id)
    }

    pub fn delete(&self, id: &R::Id) -> Result<(), InternalError> {
        self.ext.delete(&self.store.encode_id(id)?)
    }

    #[must_use]
    pub fn new_iterator(&self, opts: &IteratorOptions) -> RecordCursor<'a, R> {
        self.typed(self.ext.new_iterator(opts))
    }

    /// Records with ids inside the exact bounds, ascending or descending.
    pub fn iter_range(
        &self,
        low: Bound<R::Id>,
        high: Bound<R::Id>,
        reverse: bool,
    ) -> Result<RecordCursor<'a, R>, InternalError> {
        let encode = |bound: Bound<R::Id>| -> Result<Bound<Vec<u8>>, InternalError> {
            Ok(match bound {
                Bound::Included(id) => Bound::Included(self.store.encode_id(&id)?),
                Bound::Excluded(id) => Bound::Excluded(self.store.encode_id(&id)?),
                Bound::Unbounded => Bound::Unbounded,
            })
        };
        let (start, stop) = if reverse {
            (encode(high)?, encode(low)?)
        } else {
            (encode(low)?, encode(high)?)
        };

        let mut cursor = self
            .ext
            .new_iterator(&IteratorOptions::default().reversed(reverse))
            .boxed();
        if let Bound::Included(key) | Bound::Excluded(key) = &start {
            cursor = cursor.rewind_seek(key).boxed();
        }
        if let Bound::Excluded(key) = start {
            cursor = cursor.filter(move |c| Ok(c.key()? != key)).boxed();
        }
        if let Bound::Included(key) | Bound::Excluded(key) = &stop {
            let inclusive = matches!(stop, Bound::Included(_));
            let key = key.clone();
            cursor = cursor
                .sever(move |c| {
                    let current = c.key()?;
                    let past = if reverse { current < key } else { current > key };
                    Ok(past || (!inclusive && current == key))
                })
                .boxed();
        }

        Ok(self.typed(cursor))
    }

    /// Records matching `source` under the store's predicate engine.
    pub fn query(&self, source: &str) -> Result<RecordCursor<'a, R>, InternalError>
    where
        R: FieldValues,
    {
        let engine = Arc::clone(&self.store.shared.engine);
        self.query_with(&*engine, source, &IteratorOptions::default())
    }

    pub fn query_with(
        &self,
        engine: &dyn ExprEngine,
        source: &str,
        opts: &IteratorOptions,
    ) -> Result<RecordCursor<'a, R>, InternalError>
    where
        R: FieldValues,
    {
        let matcher = engine.compile(source)?;
        let matching = self
            .new_iterator(opts)
            .filter(move |c| matcher.matches(&c.value()?));

        Ok(matching.boxed())
    }

    /// Records found through the index `name`, in index order.
    pub fn lookup(
        &self,
        name: &str,
        bounds: &[PathBound],
        reverse: bool,
    ) -> Result<RecordCursor<'a, R>, InternalError> {
        let index = self.store.index(name).ok_or_else(|| {
            InternalError::invalid_argument(ErrorOrigin::Record, format!("unknown index '{name}'"))
        })?;
        let hits = index.lookup_records(self.store.ext(), self.ext.txn(), bounds, reverse)?;

        Ok(self.typed(hits))
    }

    pub(crate) fn typed<C>(&self, cursor: C) -> RecordCursor<'a, R>
    where
        C: Cursor<Key = Vec<u8>, Value = R, Seek = [u8]> + 'a,
    {
        let keys = Arc::clone(&self.store.shared.id_codec);
        let values = Arc::clone(&keys);

        cursor
            .map_kv(
                move |key: Vec<u8>| keys.decode(&key),
                move |c: &mut C| {
                    let id = values.decode(&c.key()?)?;
                    let mut record = c.value()?;
                    record.set_id(id);
                    Ok(record)
                },
            )
            .boxed()
    }
}

impl<R: Record> fmt::Debug for RecordInstance<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordInstance")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
