//! Module: range
//! Responsibility: chunk bound algebra and the physical scan plan over a ref
//! store, forward and reverse.
//! Does not own: how chunks are planned (see `index`).
//!
//! Bounds are prefixes of ref-store physical keys (`A ∥ B`):
//! - `Included(l)` low: key >= l.
//! - `Excluded(l)` low: key > l and key does not start with l.
//! - `Included(h)` high: key <= h or key starts with h.
//! - `Excluded(h)` high: key < h.
//!
//! Forward scans seek the low bound and sever past the high bound; reverse
//! scans seek the high bound (past its prefix when inclusive) and sever below
//! the low bound. Chunks are walked in the order given.

#[cfg(test)]
mod tests;

use crate::{
    cursor::{BoxCursor, Cursor, CursorExt, Flatten, collect_values, empty, invalid_position},
    error::InternalError,
    kv::IteratorOptions,
    reference::RefInstance,
};
use std::ops::Bound;

/// Cursor over ref entries produced by a range scan (key `A`, value `B`).
pub type RangeCursor<'a> = BoxCursor<'a, Vec<u8>, Vec<u8>, [u8]>;

///
/// Chunk
///
/// One contiguous range over ref-store keys.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Chunk {
    pub low: Bound<Vec<u8>>,
    pub high: Bound<Vec<u8>>,
}

impl Chunk {
    #[must_use]
    pub const fn new(low: Bound<Vec<u8>>, high: Bound<Vec<u8>>) -> Self {
        Self { low, high }
    }

    /// Every key.
    #[must_use]
    pub const fn all() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    /// Every key starting with `prefix`.
    #[must_use]
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        let prefix = prefix.into();
        Self::new(Bound::Included(prefix.clone()), Bound::Included(prefix))
    }

    /// Every entry whose prefix part starts with `key`; the equality chunk
    /// of index lookups.
    #[must_use]
    pub fn point(key: impl Into<Vec<u8>>) -> Self {
        Self::prefix(key)
    }

    /// True when no key can satisfy both bounds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let start = match &self.low {
            Bound::Unbounded => return false,
            Bound::Included(l) => l.clone(),
            Bound::Excluded(l) => match successor(l) {
                Some(next) => next,
                None => return true,
            },
        };

        !below_high(&start, &self.high)
    }

    /// Whether the ref-store key `key` lies in the chunk.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        above_low(key, &self.low) && below_high(key, &self.high)
    }
}

// Smallest key above every key starting with `bytes`; none when `bytes`
// is empty or all 0xFF.
fn successor(bytes: &[u8]) -> Option<Vec<u8>> {
    let end = bytes.iter().rposition(|b| *b != 0xFF)?;
    let mut next = bytes[..=end].to_vec();
    next[end] += 1;

    Some(next)
}

fn above_low(key: &[u8], low: &Bound<Vec<u8>>) -> bool {
    match low {
        Bound::Unbounded => true,
        Bound::Included(l) => key >= l.as_slice(),
        Bound::Excluded(l) => key > l.as_slice() && !key.starts_with(l),
    }
}

fn below_high(key: &[u8], high: &Bound<Vec<u8>>) -> bool {
    match high {
        Bound::Unbounded => true,
        Bound::Included(h) => key <= h.as_slice() || key.starts_with(h),
        Bound::Excluded(h) => key < h.as_slice(),
    }
}

fn with_prefix(prefix: &[u8], bound: &Bound<Vec<u8>>) -> Bound<Vec<u8>> {
    let join = |b: &Vec<u8>| [prefix, b.as_slice()].concat();

    match bound {
        Bound::Unbounded => Bound::Unbounded,
        Bound::Included(b) => Bound::Included(join(b)),
        Bound::Excluded(b) => Bound::Excluded(join(b)),
    }
}

// Engine key under the cursor; bound checks run on it so they stay valid
// through any combinator that forwards `item`.
fn engine_key<C: Cursor + ?Sized>(cursor: &C) -> Result<&[u8], InternalError> {
    cursor
        .item()
        .map(|item| item.key.as_slice())
        .ok_or_else(invalid_position)
}

/// Cursor over the entries of one chunk.
#[must_use]
pub fn chunk_cursor<'a>(refs: &RefInstance<'a>, chunk: &Chunk, reverse: bool) -> RangeCursor<'a> {
    if chunk.is_empty() {
        return empty().boxed();
    }

    let store_prefix = refs.raw().prefix();
    let low = with_prefix(store_prefix, &chunk.low);
    let high = with_prefix(store_prefix, &chunk.high);
    let base = refs.new_iterator(&IteratorOptions::default().reversed(reverse));

    if reverse {
        let positioned: RangeCursor<'a> = match &chunk.high {
            Bound::Unbounded => base.boxed(),
            Bound::Included(h) => match successor(h) {
                Some(next) => base.rewind_seek(&next).boxed(),
                None => base.boxed(),
            },
            Bound::Excluded(h) => base.rewind_seek(h).boxed(),
        };

        positioned
            .filter(move |c| Ok(below_high(engine_key(c)?, &high)))
            .sever(move |c| Ok(!above_low(engine_key(c)?, &low)))
            .boxed()
    } else {
        let positioned: RangeCursor<'a> = match &chunk.low {
            Bound::Unbounded => base.boxed(),
            Bound::Included(l) | Bound::Excluded(l) => base.rewind_seek(l).boxed(),
        };

        positioned
            .filter(move |c| Ok(above_low(engine_key(c)?, &low)))
            .sever(move |c| Ok(!below_high(engine_key(c)?, &high)))
            .boxed()
    }
}

/// Entries in the union of `chunks`, chunk after chunk.
///
/// Disjoint chunks given in scan order (descending for reverse scans) yield
/// one globally ordered stream.
pub fn scan<'a, C>(refs: &RefInstance<'a>, chunks: C, reverse: bool) -> RangeCursor<'a>
where
    C: Cursor<Value = Chunk> + 'a,
{
    let refs = refs.clone();
    let per_chunk = chunks.map_values(move |c| Ok(chunk_cursor(&refs, &c.value()?, reverse)));

    Flatten::new(per_chunk).boxed()
}

/// Key parts (`B`) of every entry in the union of `chunks`.
pub fn scan_keys<'a, C>(
    refs: &RefInstance<'a>,
    chunks: C,
    reverse: bool,
) -> Result<Vec<Vec<u8>>, InternalError>
where
    C: Cursor<Value = Chunk> + 'a,
{
    collect_values(&mut scan(refs, chunks, reverse))
}
