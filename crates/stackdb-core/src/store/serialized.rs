use crate::{
    cursor::Cursor,
    error::InternalError,
    kv::{Entry, IteratorOptions, KvItem, Transaction},
    serialize::Codec,
    store::{PrefixCursor, PrefixInstance, PrefixStore},
};
use std::{fmt, sync::Arc};

///
/// SerializedStore
///
/// Typed values over a prefix store, marshalled through a pluggable codec.
///

pub struct SerializedStore<T> {
    store: PrefixStore,
    codec: Arc<dyn Codec<T>>,
}

impl<T> SerializedStore<T> {
    #[must_use]
    pub fn new(store: PrefixStore, codec: Arc<dyn Codec<T>>) -> Self {
        Self { store, codec }
    }

    #[must_use]
    pub const fn store(&self) -> &PrefixStore {
        &self.store
    }

    #[must_use]
    pub fn codec(&self) -> &Arc<dyn Codec<T>> {
        &self.codec
    }

    #[must_use]
    pub fn instance<'a>(&self, txn: &'a dyn Transaction) -> SerializedInstance<'a, T> {
        SerializedInstance {
            inner: self.store.instance(txn),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<T> Clone for SerializedStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<T> fmt::Debug for SerializedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializedStore")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

///
/// SerializedInstance
///

pub struct SerializedInstance<'a, T> {
    inner: PrefixInstance<'a>,
    codec: Arc<dyn Codec<T>>,
}

impl<'a, T> SerializedInstance<'a, T> {
    #[must_use]
    pub const fn raw(&self) -> &PrefixInstance<'a> {
        &self.inner
    }

    pub fn get(&self, key: &[u8]) -> Result<T, InternalError> {
        let bytes = self.inner.get_value(key)?;
        self.codec.unmarshal(&bytes)
    }

    /// Value plus the raw entry it was decoded from.
    pub fn get_with_item(&self, key: &[u8]) -> Result<(T, KvItem), InternalError> {
        let item = self.inner.get(key)?;
        let value = self.codec.unmarshal(&item.value)?;

        Ok((value, item))
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool, InternalError> {
        self.inner.exists(key)
    }

    pub fn set(&self, key: &[u8], value: &T) -> Result<(), InternalError> {
        let bytes = self.codec.marshal(value)?;
        self.inner.set(key, &bytes)
    }

    /// Write with entry metadata (user meta byte, expiry) taken from `template`.
    pub fn set_with(&self, key: &[u8], value: &T, template: Entry) -> Result<(), InternalError> {
        let bytes = self.codec.marshal(value)?;
        self.inner.set_entry(Entry {
            key: key.to_vec(),
            value: bytes,
            ..template
        })
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), InternalError> {
        self.inner.delete(key)
    }

    #[must_use]
    pub fn new_iterator(&self, opts: &IteratorOptions) -> SerializedCursor<'a, T> {
        SerializedCursor {
            base: self.inner.new_iterator(opts),
            codec: Arc::clone(&self.codec),
        }
    }
}

///
/// SerializedCursor
/// Values are decoded when asked for.
///

pub struct SerializedCursor<'a, T> {
    base: PrefixCursor<'a>,
    codec: Arc<dyn Codec<T>>,
}

impl<T> fmt::Debug for SerializedCursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializedCursor")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl<T> Cursor for SerializedCursor<'_, T> {
    type Key = Vec<u8>;
    type Value = T;
    type Seek = [u8];

    fn rewind(&mut self) {
        self.base.rewind();
    }

    fn seek(&mut self, key: &[u8]) {
        self.base.seek(key);
    }

    fn next(&mut self) {
        self.base.next();
    }

    fn valid(&self) -> bool {
        self.base.valid()
    }

    fn key(&self) -> Result<Vec<u8>, InternalError> {
        self.base.key()
    }

    fn value(&mut self) -> Result<T, InternalError> {
        let bytes = self.base.value()?;
        self.codec.unmarshal(&bytes)
    }

    fn item(&self) -> Option<&KvItem> {
        self.base.item()
    }

    fn status(&self) -> Result<(), InternalError> {
        self.base.status()
    }

    fn close(&mut self) {
        self.base.close();
    }
}
