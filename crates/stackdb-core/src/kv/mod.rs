//! Module: kv
//! Responsibility: the seam to the embedded ordered key-value engine.
//! Does not own: key layout above raw bytes (see `store`).
//!
//! Invariants:
//! - Keys are ordered by plain byte comparison.
//! - Transaction methods take `&self` so iterators, nested store instances
//!   and writes can share one transaction.
//! - A transaction that is dropped without `commit` is discarded.

mod memory;
mod sequence;

#[cfg(test)]
mod tests;

use crate::{
    cursor::Cursor,
    error::{ErrorOrigin, InternalError},
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use memory::{MemoryCursor, MemoryDb};
pub use sequence::Sequence;

/// Boxed raw engine cursor.
pub type KvCursor<'a> = Box<dyn Cursor<Key = Vec<u8>, Value = Vec<u8>, Seek = [u8]> + 'a>;

/// Current unix time in seconds, the clock TTL stamps are compared against.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

///
/// Entry
///
/// One pending write: value plus the per-entry user metadata byte and an
/// optional absolute expiry stamp (unix seconds).
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub user_meta: u8,
    pub expires_at: Option<u64>,
}

impl Entry {
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            user_meta: 0,
            expires_at: None,
        }
    }

    #[must_use]
    pub const fn with_meta(mut self, user_meta: u8) -> Self {
        self.user_meta = user_meta;
        self
    }

    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn with_ttl(self, ttl: Duration) -> Self {
        let expires_at = unix_now().saturating_add(ttl.as_secs());
        self.with_expires_at(expires_at)
    }
}

///
/// KvItem
///
/// A stored entry as handed out by gets and iterators.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct KvItem {
    #[serde(with = "serde_bytes")]
    pub key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
    pub user_meta: u8,
    pub expires_at: Option<u64>,
}

impl KvItem {
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

///
/// IteratorOptions
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IteratorOptions {
    pub prefix: Vec<u8>,
    pub reverse: bool,
    pub prefetch_values: bool,
}

impl IteratorOptions {
    #[must_use]
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn reversed(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Same options with `fragment` appended to the prefix.
    #[must_use]
    pub fn nested(&self, fragment: &[u8]) -> Self {
        let mut prefix = Vec::with_capacity(fragment.len() + self.prefix.len());
        prefix.extend_from_slice(fragment);
        prefix.extend_from_slice(&self.prefix);

        Self {
            prefix,
            reverse: self.reverse,
            prefetch_values: self.prefetch_values,
        }
    }
}

///
/// Transaction
///

pub trait Transaction {
    /// Fetch one entry; `NotFound` when absent or expired.
    fn get(&self, key: &[u8]) -> Result<KvItem, InternalError>;

    fn set_entry(&self, entry: Entry) -> Result<(), InternalError>;

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), InternalError> {
        self.set_entry(Entry::new(key, value))
    }

    fn delete(&self, key: &[u8]) -> Result<(), InternalError>;

    /// Ordered cursor over keys carrying `opts.prefix`; cursor keys are
    /// physical (untrimmed).
    fn new_iterator(&self, opts: &IteratorOptions) -> KvCursor<'_>;

    fn is_writable(&self) -> bool;

    fn commit(self: Box<Self>) -> Result<(), InternalError>;

    fn discard(self: Box<Self>);
}

///
/// Database
///

pub trait Database: Send + Sync {
    fn begin(&self, writable: bool) -> Box<dyn Transaction + '_>;
}

///
/// DatabaseExt
///
/// Managed transactions: `update` commits on `Ok` and discards on `Err`.
///

pub trait DatabaseExt: Database {
    fn update<R>(
        &self,
        f: impl FnOnce(&dyn Transaction) -> Result<R, InternalError>,
    ) -> Result<R, InternalError> {
        let txn = self.begin(true);
        match f(&*txn) {
            Ok(out) => {
                txn.commit()?;
                Ok(out)
            }
            Err(err) => {
                txn.discard();
                Err(err)
            }
        }
    }

    fn view<R>(
        &self,
        f: impl FnOnce(&dyn Transaction) -> Result<R, InternalError>,
    ) -> Result<R, InternalError> {
        let txn = self.begin(false);
        let out = f(&*txn);
        txn.discard();

        out
    }
}

impl<D: Database + ?Sized> DatabaseExt for D {}

pub(crate) fn key_not_found(key: &[u8]) -> InternalError {
    InternalError::not_found(ErrorOrigin::Kv, format!("key not found: {key:02x?}"))
}
