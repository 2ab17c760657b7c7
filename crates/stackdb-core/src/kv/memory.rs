use crate::{
    cursor::{Cursor, invalid_position},
    error::{ErrorOrigin, InternalError},
    kv::{Database, Entry, IteratorOptions, KvCursor, KvItem, Transaction, key_not_found, unix_now},
    serialize::{deserialize_bounded, serialize},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    fmt,
    ops::Bound,
    path::Path,
    sync::Arc,
};

type Snapshot = Arc<BTreeMap<Vec<u8>, Versioned>>;

///
/// StoredValue
///

#[derive(Clone, Debug, Deserialize, Serialize)]
struct StoredValue {
    #[serde(with = "serde_bytes")]
    value: Vec<u8>,
    user_meta: u8,
    expires_at: Option<u64>,
}

impl StoredValue {
    fn from_entry(entry: Entry) -> (Vec<u8>, Self) {
        (
            entry.key,
            Self {
                value: entry.value,
                user_meta: entry.user_meta,
                expires_at: entry.expires_at,
            },
        )
    }

    fn live_item(&self, key: &[u8], now: u64) -> Option<KvItem> {
        let item = KvItem {
            key: key.to_vec(),
            value: self.value.clone(),
            user_meta: self.user_meta,
            expires_at: self.expires_at,
        };

        (!item.is_expired_at(now)).then_some(item)
    }
}

///
/// Versioned
/// Committed slot; `value == None` is a tombstone kept for conflict checks.
///

#[derive(Clone, Debug)]
struct Versioned {
    version: u64,
    value: Option<StoredValue>,
}

#[derive(Debug, Default)]
struct Committed {
    version: u64,
    entries: Snapshot,
}

///
/// SnapshotEntry
///

#[derive(Deserialize, Serialize)]
struct SnapshotEntry {
    #[serde(with = "serde_bytes")]
    key: Vec<u8>,
    value: StoredValue,
}

///
/// MemoryDb
///
/// In-memory ordered engine: a copy-on-write `BTreeMap` behind a lock.
/// Transactions read the state committed at `begin` overlaid with their own
/// pending writes and fail at commit when a key they read (or a prefix they
/// scanned) was committed by someone else in the meantime.
///

#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<RwLock<Committed>>,
}

impl MemoryDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-deleted, non-expired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = unix_now();
        let committed = self.inner.read();

        committed
            .entries
            .values()
            .filter(|slot| {
                slot.value
                    .as_ref()
                    .is_some_and(|v| v.expires_at.is_none_or(|at| at > now))
            })
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write every live entry to `path` as CBOR.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), InternalError> {
        let entries: Vec<SnapshotEntry> = {
            let committed = self.inner.read();
            committed
                .entries
                .iter()
                .filter_map(|(key, slot)| {
                    slot.value.as_ref().map(|value| SnapshotEntry {
                        key: key.clone(),
                        value: value.clone(),
                    })
                })
                .collect()
        };

        let bytes = serialize(&entries)?;
        std::fs::write(path.as_ref(), bytes).map_err(|e| {
            InternalError::internal(ErrorOrigin::Kv, format!("snapshot write failed: {e}"))
        })?;

        tracing::debug!(entries = entries.len(), path = %path.as_ref().display(), "saved snapshot");

        Ok(())
    }

    /// Load a database previously written by [`MemoryDb::save_snapshot`].
    pub fn open_snapshot(path: impl AsRef<Path>) -> Result<Self, InternalError> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            InternalError::internal(ErrorOrigin::Kv, format!("snapshot read failed: {e}"))
        })?;
        let entries: Vec<SnapshotEntry> = deserialize_bounded(&bytes, bytes.len())?;

        let map = entries
            .into_iter()
            .map(|e| {
                (
                    e.key,
                    Versioned {
                        version: 1,
                        value: Some(e.value),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();

        tracing::debug!(entries = map.len(), path = %path.as_ref().display(), "opened snapshot");

        Ok(Self {
            inner: Arc::new(RwLock::new(Committed {
                version: 1,
                entries: Arc::new(map),
            })),
        })
    }
}

impl fmt::Debug for MemoryDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let committed = self.inner.read();
        f.debug_struct("MemoryDb")
            .field("version", &committed.version)
            .field("slots", &committed.entries.len())
            .finish()
    }
}

impl Database for MemoryDb {
    fn begin(&self, writable: bool) -> Box<dyn Transaction + '_> {
        let (read_version, snapshot) = {
            let committed = self.inner.read();
            (committed.version, Arc::clone(&committed.entries))
        };

        Box::new(MemoryTxn {
            db: &self.inner,
            snapshot,
            read_version,
            writable,
            pending: RefCell::new(BTreeMap::new()),
            reads: RefCell::new(BTreeSet::new()),
            scanned: RefCell::new(Vec::new()),
        })
    }
}

///
/// MemoryTxn
///

struct MemoryTxn<'db> {
    db: &'db RwLock<Committed>,
    snapshot: Snapshot,
    read_version: u64,
    writable: bool,
    pending: RefCell<BTreeMap<Vec<u8>, Option<StoredValue>>>,
    reads: RefCell<BTreeSet<Vec<u8>>>,
    scanned: RefCell<Vec<Vec<u8>>>,
}

impl MemoryTxn<'_> {
    fn ensure_writable(&self) -> Result<(), InternalError> {
        if self.writable {
            Ok(())
        } else {
            Err(InternalError::invalid_argument(
                ErrorOrigin::Kv,
                "write on a read-only transaction",
            ))
        }
    }

    fn stage(&self, key: Vec<u8>, value: Option<StoredValue>) -> Result<(), InternalError> {
        self.ensure_writable()?;
        if key.is_empty() {
            return Err(InternalError::invalid_argument(ErrorOrigin::Kv, "empty key"));
        }
        self.pending.borrow_mut().insert(key, value);

        Ok(())
    }

    fn changed_since_begin(&self, committed: &Committed) -> bool {
        let newer = |slot: &Versioned| slot.version > self.read_version;

        let key_changed = self
            .reads
            .borrow()
            .iter()
            .any(|key| committed.entries.get(key).is_some_and(newer));
        if key_changed {
            return true;
        }

        self.scanned.borrow().iter().any(|prefix| {
            prefix_range(&*committed.entries, prefix).any(|(_, slot)| newer(slot))
        })
    }
}

fn prefix_range<'m, V>(
    map: &'m BTreeMap<Vec<u8>, V>,
    prefix: &'m [u8],
) -> impl Iterator<Item = (&'m Vec<u8>, &'m V)> + 'm {
    map.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(prefix))
}

impl Transaction for MemoryTxn<'_> {
    fn get(&self, key: &[u8]) -> Result<KvItem, InternalError> {
        if let Some(staged) = self.pending.borrow().get(key) {
            return staged
                .as_ref()
                .and_then(|v| v.live_item(key, unix_now()))
                .ok_or_else(|| key_not_found(key));
        }

        self.reads.borrow_mut().insert(key.to_vec());

        self.snapshot
            .get(key)
            .and_then(|slot| slot.value.as_ref())
            .and_then(|v| v.live_item(key, unix_now()))
            .ok_or_else(|| key_not_found(key))
    }

    fn set_entry(&self, entry: Entry) -> Result<(), InternalError> {
        let (key, value) = StoredValue::from_entry(entry);
        self.stage(key, Some(value))
    }

    fn delete(&self, key: &[u8]) -> Result<(), InternalError> {
        self.stage(key.to_vec(), None)
    }

    fn new_iterator(&self, opts: &IteratorOptions) -> KvCursor<'_> {
        let now = unix_now();
        self.scanned.borrow_mut().push(opts.prefix.clone());

        let mut merged: BTreeMap<&[u8], Option<&StoredValue>> =
            prefix_range(&*self.snapshot, &opts.prefix)
                .map(|(key, slot)| (key.as_slice(), slot.value.as_ref()))
                .collect();

        let pending = self.pending.borrow();
        for (key, value) in prefix_range(&*pending, &opts.prefix) {
            merged.insert(key.as_slice(), value.as_ref());
        }

        let mut items: Vec<KvItem> = merged
            .into_iter()
            .filter_map(|(key, value)| value.and_then(|v| v.live_item(key, now)))
            .collect();
        if opts.reverse {
            items.reverse();
        }

        Box::new(MemoryCursor::new(items, opts.reverse))
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn commit(self: Box<Self>) -> Result<(), InternalError> {
        let pending = self.pending.take();
        if pending.is_empty() {
            return Ok(());
        }

        let mut committed = self.db.write();
        if self.changed_since_begin(&committed) {
            return Err(InternalError::conflict(
                ErrorOrigin::Kv,
                "transaction conflict: read set changed since begin",
            ));
        }

        committed.version += 1;
        let version = committed.version;
        let entries = Arc::make_mut(&mut committed.entries);
        for (key, value) in pending {
            entries.insert(key, Versioned { version, value });
        }

        Ok(())
    }

    fn discard(self: Box<Self>) {}
}

///
/// MemoryCursor
///
/// Materialized cursor; items are kept in iteration order.
///

#[derive(Clone, Debug)]
pub struct MemoryCursor {
    items: Vec<KvItem>,
    pos: usize,
    reverse: bool,
}

impl MemoryCursor {
    #[must_use]
    pub const fn new(items: Vec<KvItem>, reverse: bool) -> Self {
        Self {
            items,
            pos: 0,
            reverse,
        }
    }

    fn current(&self) -> Result<&KvItem, InternalError> {
        self.items.get(self.pos).ok_or_else(invalid_position)
    }
}

impl Cursor for MemoryCursor {
    type Key = Vec<u8>;
    type Value = Vec<u8>;
    type Seek = [u8];

    fn rewind(&mut self) {
        self.pos = 0;
    }

    fn seek(&mut self, key: &[u8]) {
        // Reverse cursors land on the largest key <= `key`.
        self.pos = if self.reverse {
            self.items.partition_point(|item| item.key.as_slice() > key)
        } else {
            self.items.partition_point(|item| item.key.as_slice() < key)
        };
    }

    fn next(&mut self) {
        if self.pos < self.items.len() {
            self.pos += 1;
        }
    }

    fn valid(&self) -> bool {
        self.pos < self.items.len()
    }

    fn key(&self) -> Result<Vec<u8>, InternalError> {
        Ok(self.current()?.key.clone())
    }

    fn value(&mut self) -> Result<Vec<u8>, InternalError> {
        Ok(self.current()?.value.clone())
    }

    fn item(&self) -> Option<&KvItem> {
        self.items.get(self.pos)
    }
}
