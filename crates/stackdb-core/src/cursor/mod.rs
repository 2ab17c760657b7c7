//! Module: cursor
//! Responsibility: the positioned-cursor abstraction every store hands out,
//! plus the lazy combinators layered over it.
//! Does not own: engine iteration (see `kv`) or range planning (see `range`).
//!
//! Invariants:
//! - Cursors are single-threaded and restartable: `rewind` may be called at
//!   any time and repositions at the first item.
//! - Positioning never fails; an error raised while positioning (a predicate
//!   or key derivation) invalidates the cursor and is reported by `status`.
//! - Combinators close their base on `close`; `close` is idempotent.
//! - Forward combinators keep the base order.

mod aggregate;
mod enumerate;
mod filter;
mod flatten;
mod join;
mod lookup;
mod map;
mod rewind_seek;
mod sever;
mod slice;
mod window;


use crate::{
    error::{ErrorOrigin, InternalError},
    kv::KvItem,
};
use std::{fmt, marker::PhantomData};

pub use aggregate::Aggregate;
pub use enumerate::Enumerate;
pub use filter::Filter;
pub use flatten::Flatten;
pub use join::Join;
pub use lookup::Lookup;
pub use map::Map;
pub use rewind_seek::RewindSeek;
pub use sever::Sever;
pub use slice::Slice;
pub use window::{Limit, Skip};

///
/// Cursor
///
/// Positioned cursor over ordered `(key, value)` pairs.
///
/// `key` is cheap and side-effect free; `value` may do work (decode, fetch)
/// and therefore takes `&mut self`. `item` exposes the raw engine entry under
/// the current position when one exists.
///

pub trait Cursor {
    type Key;
    type Value;
    type Seek: ?Sized;

    fn rewind(&mut self);

    /// Position at the first item at or after `key` in cursor direction.
    fn seek(&mut self, key: &Self::Seek);

    fn next(&mut self);

    fn valid(&self) -> bool;

    fn key(&self) -> Result<Self::Key, InternalError>;

    fn value(&mut self) -> Result<Self::Value, InternalError>;

    fn item(&self) -> Option<&KvItem> {
        None
    }

    /// Sticky error raised while positioning, if any.
    fn status(&self) -> Result<(), InternalError> {
        Ok(())
    }

    fn close(&mut self) {}
}

impl<C: Cursor + ?Sized> Cursor for Box<C> {
    type Key = C::Key;
    type Value = C::Value;
    type Seek = C::Seek;

    fn rewind(&mut self) {
        (**self).rewind();
    }

    fn seek(&mut self, key: &Self::Seek) {
        (**self).seek(key);
    }

    fn next(&mut self) {
        (**self).next();
    }

    fn valid(&self) -> bool {
        (**self).valid()
    }

    fn key(&self) -> Result<Self::Key, InternalError> {
        (**self).key()
    }

    fn value(&mut self) -> Result<Self::Value, InternalError> {
        (**self).value()
    }

    fn item(&self) -> Option<&KvItem> {
        (**self).item()
    }

    fn status(&self) -> Result<(), InternalError> {
        (**self).status()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Boxed cursor with erased combinator type.
pub type BoxCursor<'a, K, V, S> = Box<dyn Cursor<Key = K, Value = V, Seek = S> + 'a>;

pub(crate) fn invalid_position() -> InternalError {
    InternalError::internal(ErrorOrigin::Cursor, "cursor is not positioned on an item")
}

pub(crate) fn severed() -> InternalError {
    InternalError::integrity(ErrorOrigin::Cursor, "severed iterator")
}

///
/// CursorExt
///

pub trait CursorExt: Cursor + Sized {
    fn filter<P>(self, pred: P) -> Filter<Self, P>
    where
        P: FnMut(&mut Self) -> Result<bool, InternalError>,
    {
        Filter::new(self, pred)
    }

    fn limit(self, n: usize) -> Limit<Self> {
        Limit::new(self, n)
    }

    fn skip(self, n: usize) -> Skip<Self> {
        Skip::new(self, n)
    }

    fn sever<P>(self, pred: P) -> Sever<Self, P>
    where
        P: FnMut(&mut Self) -> Result<bool, InternalError>,
    {
        Sever::new(self, pred)
    }

    fn rewind_seek(self, key: &Self::Seek) -> RewindSeek<Self>
    where
        Self::Seek: ToOwned,
    {
        RewindSeek::new(self, key)
    }

    fn enumerate(self) -> Enumerate<Self> {
        Enumerate::new(self)
    }

    fn map_kv<K, V, KF, VF>(self, key_fn: KF, value_fn: VF) -> Map<Self, KF, VF>
    where
        KF: Fn(Self::Key) -> Result<K, InternalError>,
        VF: FnMut(&mut Self) -> Result<V, InternalError>,
    {
        Map::new(self, key_fn, value_fn)
    }

    fn map_values<V, VF>(
        self,
        value_fn: VF,
    ) -> Map<Self, fn(Self::Key) -> Result<Self::Key, InternalError>, VF>
    where
        VF: FnMut(&mut Self) -> Result<V, InternalError>,
    {
        let key_fn: fn(Self::Key) -> Result<Self::Key, InternalError> = Ok;
        Map::new(self, key_fn, value_fn)
    }

    fn aggregate<S, F>(self, init: S, f: F) -> Aggregate<Self, S, F>
    where
        S: Clone,
        F: FnMut(S, &mut Self) -> Result<S, InternalError>,
    {
        Aggregate::new(self, init, f)
    }

    fn boxed<'a>(self) -> BoxCursor<'a, Self::Key, Self::Value, Self::Seek>
    where
        Self: 'a,
    {
        Box::new(self)
    }
}

impl<C: Cursor> CursorExt for C {}

///
/// Empty
///

pub struct Empty<K, V, S: ?Sized> {
    _marker: PhantomData<fn(&S) -> (K, V)>,
}

/// A cursor that is never valid.
#[must_use]
pub fn empty<K, V, S: ?Sized>() -> Empty<K, V, S> {
    Empty {
        _marker: PhantomData,
    }
}

impl<K, V, S: ?Sized> fmt::Debug for Empty<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Empty")
    }
}

impl<K, V, S: ?Sized> Cursor for Empty<K, V, S> {
    type Key = K;
    type Value = V;
    type Seek = S;

    fn rewind(&mut self) {}

    fn seek(&mut self, _key: &S) {}

    fn next(&mut self) {}

    fn valid(&self) -> bool {
        false
    }

    fn key(&self) -> Result<K, InternalError> {
        Err(invalid_position())
    }

    fn value(&mut self) -> Result<V, InternalError> {
        Err(invalid_position())
    }
}

// Drain helpers: rewind, walk to exhaustion, close, surface the sticky status.

fn walk<C, T>(
    cursor: &mut C,
    mut visit: impl FnMut(&mut C) -> Result<T, InternalError>,
) -> Result<Vec<T>, InternalError>
where
    C: Cursor + ?Sized,
{
    let mut out = Vec::new();
    cursor.rewind();
    while cursor.valid() {
        out.push(visit(cursor)?);
        cursor.next();
    }
    cursor.status()?;

    Ok(out)
}

fn drain<C, T>(
    cursor: &mut C,
    visit: impl FnMut(&mut C) -> Result<T, InternalError>,
) -> Result<Vec<T>, InternalError>
where
    C: Cursor + ?Sized,
{
    let out = walk(cursor, visit);
    cursor.close();

    out
}

pub fn collect_pairs<C>(cursor: &mut C) -> Result<Vec<(C::Key, C::Value)>, InternalError>
where
    C: Cursor + ?Sized,
{
    drain(cursor, |c| Ok((c.key()?, c.value()?)))
}

pub fn collect_keys<C>(cursor: &mut C) -> Result<Vec<C::Key>, InternalError>
where
    C: Cursor + ?Sized,
{
    drain(cursor, |c| c.key())
}

pub fn collect_values<C>(cursor: &mut C) -> Result<Vec<C::Value>, InternalError>
where
    C: Cursor + ?Sized,
{
    drain(cursor, |c| c.value())
}

pub fn count<C>(cursor: &mut C) -> Result<usize, InternalError>
where
    C: Cursor + ?Sized,
{
    drain(cursor, |_| Ok(())).map(|items| items.len())
}

/// First pair after a rewind, if any.
pub fn first<C>(cursor: &mut C) -> Result<Option<(C::Key, C::Value)>, InternalError>
where
    C: Cursor + ?Sized,
{
    cursor.rewind();
    let out = if cursor.valid() {
        cursor
            .key()
            .and_then(|key| cursor.value().map(|value| (key, value)))
            .map(Some)
    } else {
        cursor.status().map(|()| None)
    };
    cursor.close();

    out
}
