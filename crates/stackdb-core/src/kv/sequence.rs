use crate::{
    error::{ErrorOrigin, InternalError},
    kv::{Database, DatabaseExt, Transaction},
};
use parking_lot::Mutex;
use std::{fmt, sync::Arc};

#[derive(Debug)]
struct Lease {
    next: u64,
    leased: u64,
}

///
/// Sequence
///
/// Monotonic counter persisted under one key. Numbers are leased in blocks of
/// `bandwidth`; only the lease ceiling is written, so a crash skips at most
/// one block. `release` hands back the unused part of the current block.
///

pub struct Sequence {
    db: Arc<dyn Database>,
    key: Vec<u8>,
    bandwidth: u64,
    lease: Mutex<Lease>,
}

impl Sequence {
    pub fn new(
        db: Arc<dyn Database>,
        key: impl Into<Vec<u8>>,
        bandwidth: u64,
    ) -> Result<Self, InternalError> {
        if bandwidth == 0 {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Kv,
                "sequence bandwidth must be non-zero",
            ));
        }

        let seq = Self {
            db,
            key: key.into(),
            bandwidth,
            lease: Mutex::new(Lease { next: 0, leased: 0 }),
        };
        seq.refill(&mut seq.lease.lock())?;

        Ok(seq)
    }

    /// Next number of the sequence, starting at 0.
    pub fn next(&self) -> Result<u64, InternalError> {
        let mut lease = self.lease.lock();
        if lease.next >= lease.leased {
            self.refill(&mut lease)?;
        }

        let value = lease.next;
        lease.next += 1;

        Ok(value)
    }

    /// Return the unused part of the lease, if nobody leased past it since.
    pub fn release(&self) -> Result<(), InternalError> {
        let mut lease = self.lease.lock();

        self.db.update(|txn| {
            if stored_ceiling(txn, &self.key)? == lease.leased {
                txn.set(&self.key, &lease.next.to_be_bytes())?;
            }
            Ok(())
        })?;
        lease.leased = lease.next;

        Ok(())
    }

    fn refill(&self, lease: &mut Lease) -> Result<(), InternalError> {
        let (start, ceiling) = self.db.update(|txn| {
            let start = stored_ceiling(txn, &self.key)?;
            let ceiling = start.checked_add(self.bandwidth).ok_or_else(|| {
                InternalError::full(ErrorOrigin::Kv, "sequence exhausted")
            })?;
            txn.set(&self.key, &ceiling.to_be_bytes())?;

            Ok((start, ceiling))
        })?;

        tracing::debug!(start, ceiling, "sequence lease refilled");
        lease.next = start;
        lease.leased = ceiling;

        Ok(())
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("key", &self.key)
            .field("bandwidth", &self.bandwidth)
            .field("lease", &*self.lease.lock())
            .finish_non_exhaustive()
    }
}

fn stored_ceiling(txn: &dyn Transaction, key: &[u8]) -> Result<u64, InternalError> {
    match txn.get(key) {
        Ok(item) => {
            let bytes: [u8; 8] = item.value.as_slice().try_into().map_err(|_| {
                InternalError::codec(ErrorOrigin::Kv, "sequence value must be 8 bytes")
            })?;
            Ok(u64::from_be_bytes(bytes))
        }
        Err(err) if err.is_not_found() => Ok(0),
        Err(err) => Err(err),
    }
}
