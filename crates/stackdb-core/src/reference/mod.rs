//! Module: reference
//! Responsibility: composite-key entries linking a prefix part `A` to a key
//! part `B` through one physical key `A ∥ B`.
//! Does not own: what `A` and `B` encode (index keys, record ids, ...).
//!
//! Invariants:
//! - The user-meta byte of every entry holds `len(B)`, so the split needs no
//!   delimiter; `B` is therefore at most 255 bytes.
//! - Cursors report `A` as key and `B` as value, ordered by physical key.
//! - An absent value is stored as an empty one.

#[cfg(test)]
mod tests;

use crate::{
    cursor::{Cursor, invalid_position},
    error::{ErrorOrigin, InternalError},
    kv::{Entry, IteratorOptions, KvItem, Transaction},
    store::{PrefixCursor, PrefixInstance, PrefixStore},
};
use std::fmt;

/// Longest key part a ref entry can carry.
pub const MAX_KEY_PART: usize = u8::MAX as usize;

///
/// RefEntry
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RefEntry {
    pub prefix: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

impl RefEntry {
    #[must_use]
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
            value: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = Some(value.into());
        self
    }
}

///
/// RefItem
/// One decoded entry.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RefItem {
    pub prefix: Vec<u8>,
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

/// Split a physical ref key using the length tag from its user-meta byte.
pub fn split_key(full: &[u8], key_len: u8) -> Result<(&[u8], &[u8]), InternalError> {
    let key_len = usize::from(key_len);
    if key_len > full.len() {
        return Err(InternalError::codec(
            ErrorOrigin::Ref,
            format!(
                "ref entry key length {key_len} exceeds physical key length {}",
                full.len()
            ),
        ));
    }

    Ok(full.split_at(full.len() - key_len))
}

fn stored_value(value: Vec<u8>) -> Option<Vec<u8>> {
    (!value.is_empty()).then_some(value)
}

///
/// RefStore
///

#[derive(Clone, Debug, Default)]
pub struct RefStore {
    store: PrefixStore,
}

impl RefStore {
    #[must_use]
    pub const fn new(store: PrefixStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &PrefixStore {
        &self.store
    }

    #[must_use]
    pub fn instance<'a>(&self, txn: &'a dyn Transaction) -> RefInstance<'a> {
        RefInstance {
            inner: self.store.instance(txn),
        }
    }
}

///
/// RefInstance
///

#[derive(Clone, Debug)]
pub struct RefInstance<'a> {
    inner: PrefixInstance<'a>,
}

impl<'a> RefInstance<'a> {
    #[must_use]
    pub const fn raw(&self) -> &PrefixInstance<'a> {
        &self.inner
    }

    /// Write `entry.prefix ∥ key` tagged with `len(key)`.
    pub fn set(&self, key: &[u8], entry: RefEntry) -> Result<(), InternalError> {
        let key_len = u8::try_from(key.len()).map_err(|_| {
            InternalError::invalid_argument(
                ErrorOrigin::Ref,
                format!("ref key part is {} bytes, max {MAX_KEY_PART}", key.len()),
            )
        })?;

        let mut full = entry.prefix;
        full.extend_from_slice(key);

        self.inner
            .set_entry(Entry::new(full, entry.value.unwrap_or_default()).with_meta(key_len))
    }

    /// Key part of the first entry whose prefix part is exactly `prefix`.
    pub fn get(&self, prefix: &[u8]) -> Result<Vec<u8>, InternalError> {
        self.get_entry(prefix).map(|item| item.key)
    }

    pub fn get_entry(&self, prefix: &[u8]) -> Result<RefItem, InternalError> {
        let mut cursor = self.new_iterator(&IteratorOptions::prefix(prefix));
        cursor.rewind();

        while cursor.valid() {
            let item = cursor.entry()?;
            if item.prefix == prefix {
                cursor.close();
                return Ok(item);
            }
            cursor.next();
        }
        cursor.close();

        Err(InternalError::not_found(
            ErrorOrigin::Ref,
            format!("no ref entry under prefix {prefix:02x?}"),
        ))
    }

    /// Stored value of the exact pair `(prefix, key)`, if the pair exists.
    pub fn get_exact(&self, prefix: &[u8], key: &[u8]) -> Result<Option<RefItem>, InternalError> {
        let mut full = prefix.to_vec();
        full.extend_from_slice(key);

        match self.inner.get(&full) {
            Ok(item) if usize::from(item.user_meta) == key.len() => Ok(Some(RefItem {
                prefix: prefix.to_vec(),
                key: key.to_vec(),
                value: stored_value(item.value),
            })),
            Ok(_) => Ok(None),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn exists(&self, prefix: &[u8], key: &[u8]) -> Result<bool, InternalError> {
        self.get_exact(prefix, key).map(|item| item.is_some())
    }

    /// Delete by physical key.
    pub fn delete(&self, full_key: &[u8]) -> Result<(), InternalError> {
        self.inner.delete(full_key)
    }

    /// Delete the pair `(prefix, key)`.
    pub fn delete_ref(&self, prefix: &[u8], key: &[u8]) -> Result<(), InternalError> {
        let mut full = prefix.to_vec();
        full.extend_from_slice(key);

        self.inner.delete(&full)
    }

    #[must_use]
    pub fn new_iterator(&self, opts: &IteratorOptions) -> RefCursor<'a> {
        RefCursor {
            base: self.inner.new_iterator(opts),
        }
    }
}

///
/// RefCursor
///
/// Key is the prefix part, value the key part. `seek` positions on the
/// physical key, so seeking a prefix part lands on its first entry.
///

pub struct RefCursor<'a> {
    base: PrefixCursor<'a>,
}

impl RefCursor<'_> {
    fn current(&self) -> Result<&KvItem, InternalError> {
        self.base.item().ok_or_else(invalid_position)
    }

    /// Physical key (relative to the ref store) under the cursor.
    pub fn full_key(&self) -> Result<Vec<u8>, InternalError> {
        self.base.key()
    }

    /// Stored value under the cursor; `None` when the entry carries none.
    pub fn data(&self) -> Result<Option<Vec<u8>>, InternalError> {
        Ok(stored_value(self.current()?.value.clone()))
    }

    /// The whole decoded entry under the cursor.
    pub fn entry(&self) -> Result<RefItem, InternalError> {
        let full = self.base.key()?;
        let item = self.current()?;
        let (prefix, key) = split_key(&full, item.user_meta)?;

        Ok(RefItem {
            prefix: prefix.to_vec(),
            key: key.to_vec(),
            value: stored_value(item.value.clone()),
        })
    }
}

impl fmt::Debug for RefCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCursor").field("base", &self.base).finish()
    }
}

impl Cursor for RefCursor<'_> {
    type Key = Vec<u8>;
    type Value = Vec<u8>;
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
        let full = self.base.key()?;
        let (prefix, _) = split_key(&full, self.current()?.user_meta)?;

        Ok(prefix.to_vec())
    }

    fn value(&mut self) -> Result<Vec<u8>, InternalError> {
        let full = self.base.key()?;
        let (_, key) = split_key(&full, self.current()?.user_meta)?;

        Ok(key.to_vec())
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
