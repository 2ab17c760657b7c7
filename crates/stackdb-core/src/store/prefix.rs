use crate::{
    cursor::{Cursor, collect_keys},
    error::{ErrorOrigin, InternalError},
    kv::{Entry, IteratorOptions, KvCursor, KvItem, Transaction},
};
use std::{fmt, sync::Arc};

///
/// PrefixStore
///
/// Store description: an accumulated key prefix. Cheap to clone; nesting
/// copies the prefix once, at construction.
///

#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct PrefixStore {
    prefix: Arc<[u8]>,
}

impl PrefixStore {
    /// Store over the whole key space.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(prefix: impl AsRef<[u8]>) -> Self {
        Self {
            prefix: Arc::from(prefix.as_ref()),
        }
    }

    /// Nested store at `self.prefix ∥ fragment`.
    #[must_use]
    pub fn prefixed(&self, fragment: impl AsRef<[u8]>) -> Self {
        Self::new(self.key_of(fragment.as_ref()))
    }

    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Physical key of a logical key.
    #[must_use]
    pub fn key_of(&self, key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + key.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(key);
        out
    }

    /// Per-transaction handle.
    #[must_use]
    pub fn instance<'a>(&self, txn: &'a dyn Transaction) -> PrefixInstance<'a> {
        PrefixInstance {
            txn,
            prefix: Arc::clone(&self.prefix),
        }
    }
}

impl fmt::Debug for PrefixStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrefixStore({:02x?})", &*self.prefix)
    }
}

///
/// PrefixInstance
///

#[derive(Clone)]
pub struct PrefixInstance<'a> {
    txn: &'a dyn Transaction,
    prefix: Arc<[u8]>,
}

impl<'a> PrefixInstance<'a> {
    #[must_use]
    pub fn txn(&self) -> &'a dyn Transaction {
        self.txn
    }

    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn key_of(&self, key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + key.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(key);
        out
    }

    /// Entry under a logical key; the returned item carries the logical key.
    pub fn get(&self, key: &[u8]) -> Result<KvItem, InternalError> {
        let mut item = self.txn.get(&self.key_of(key))?;
        item.key = key.to_vec();

        Ok(item)
    }

    pub fn get_value(&self, key: &[u8]) -> Result<Vec<u8>, InternalError> {
        self.get(key).map(|item| item.value)
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool, InternalError> {
        match self.txn.get(&self.key_of(key)) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<(), InternalError> {
        self.txn.set(&self.key_of(key), value)
    }

    /// Write an entry whose key is logical.
    pub fn set_entry(&self, mut entry: Entry) -> Result<(), InternalError> {
        entry.key = self.key_of(&entry.key);
        self.txn.set_entry(entry)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), InternalError> {
        self.txn.delete(&self.key_of(key))
    }

    /// Cursor over keys under `prefix ∥ opts.prefix`, reporting logical keys.
    #[must_use]
    pub fn new_iterator(&self, opts: &IteratorOptions) -> PrefixCursor<'a> {
        PrefixCursor {
            base: self.txn.new_iterator(&opts.nested(&self.prefix)),
            prefix: Arc::clone(&self.prefix),
        }
    }

    /// Delete every key under `sub`; returns the number of keys removed.
    pub fn delete_prefix(&self, sub: &[u8]) -> Result<usize, InternalError> {
        let keys = collect_keys(&mut self.new_iterator(&IteratorOptions::prefix(sub)))?;
        for key in &keys {
            self.delete(key)?;
        }

        Ok(keys.len())
    }
}

impl fmt::Debug for PrefixInstance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrefixInstance({:02x?})", &*self.prefix)
    }
}

///
/// PrefixCursor
///

pub struct PrefixCursor<'a> {
    base: KvCursor<'a>,
    prefix: Arc<[u8]>,
}

impl PrefixCursor<'_> {
    fn trim<'k>(&self, key: &'k [u8]) -> Result<&'k [u8], InternalError> {
        key.strip_prefix(&*self.prefix).ok_or_else(|| {
            InternalError::internal(ErrorOrigin::Store, "cursor key outside store prefix")
        })
    }
}

impl fmt::Debug for PrefixCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrefixCursor({:02x?})", &*self.prefix)
    }
}

impl Cursor for PrefixCursor<'_> {
    type Key = Vec<u8>;
    type Value = Vec<u8>;
    type Seek = [u8];

    fn rewind(&mut self) {
        self.base.rewind();
    }

    fn seek(&mut self, key: &[u8]) {
        let mut physical = Vec::with_capacity(self.prefix.len() + key.len());
        physical.extend_from_slice(&self.prefix);
        physical.extend_from_slice(key);
        self.base.seek(&physical);
    }

    fn next(&mut self) {
        self.base.next();
    }

    fn valid(&self) -> bool {
        self.base.valid()
    }

    fn key(&self) -> Result<Vec<u8>, InternalError> {
        let physical = self.base.key()?;
        self.trim(&physical).map(<[u8]>::to_vec)
    }

    fn value(&mut self) -> Result<Vec<u8>, InternalError> {
        self.base.value()
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
