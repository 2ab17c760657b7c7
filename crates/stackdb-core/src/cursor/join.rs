use crate::{
    cursor::{Cursor, invalid_position},
    error::{ErrorOrigin, InternalError},
};
use std::{cmp::Ordering, fmt};

///
/// Join
///
/// Merges two cursors ordered by the same key, in lockstep. Each position is
/// the first key still pending on either side in the inputs' direction
/// (smallest for `new`, largest for `reverse`); `f` receives the values of
/// the sides sitting on that key. Seeking is not supported.
///

pub struct Join<A, B, F>
where
    A: Cursor,
{
    a: A,
    b: B,
    f: F,
    current: Option<A::Key>,
    on_a: bool,
    on_b: bool,
    reverse: bool,
    error: Option<InternalError>,
}

impl<A, B, V, F> Join<A, B, F>
where
    A: Cursor,
    B: Cursor<Key = A::Key>,
    A::Key: Ord + Clone,
    F: FnMut(Option<A::Value>, Option<B::Value>) -> Result<V, InternalError>,
{
    /// Join two ascending cursors.
    pub fn new(a: A, b: B, f: F) -> Self {
        Self::with_direction(a, b, f, false)
    }

    /// Join two descending cursors.
    pub fn reverse(a: A, b: B, f: F) -> Self {
        Self::with_direction(a, b, f, true)
    }

    fn with_direction(a: A, b: B, f: F, reverse: bool) -> Self {
        let mut join = Self {
            a,
            b,
            f,
            current: None,
            on_a: false,
            on_b: false,
            reverse,
            error: None,
        };
        join.settle();

        join
    }

    fn settle(&mut self) {
        let sides = (|| {
            let ka = if self.a.valid() { Some(self.a.key()?) } else { None };
            let kb = if self.b.valid() { Some(self.b.key()?) } else { None };
            Ok::<_, InternalError>((ka, kb))
        })();

        let (ka, kb) = match sides {
            Ok(sides) => sides,
            Err(err) => {
                self.error = Some(err);
                self.current = None;
                return;
            }
        };

        let (current, on_a, on_b) = match (ka, kb) {
            (None, None) => (None, false, false),
            (Some(ka), None) => (Some(ka), true, false),
            (None, Some(kb)) => (Some(kb), false, true),
            (Some(ka), Some(kb)) => match self.order(&ka, &kb) {
                Ordering::Less => (Some(ka), true, false),
                Ordering::Greater => (Some(kb), false, true),
                Ordering::Equal => (Some(ka), true, true),
            },
        };

        self.current = current;
        self.on_a = on_a;
        self.on_b = on_b;
    }

    // `Less` means `ka` comes first in the join's direction.
    fn order(&self, ka: &A::Key, kb: &A::Key) -> Ordering {
        if self.reverse {
            kb.cmp(ka)
        } else {
            ka.cmp(kb)
        }
    }
}

impl<A, B, F> fmt::Debug for Join<A, B, F>
where
    A: Cursor,
    A::Key: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Join")
            .field("current", &self.current)
            .field("on_a", &self.on_a)
            .field("on_b", &self.on_b)
            .field("reverse", &self.reverse)
            .finish_non_exhaustive()
    }
}

impl<A, B, V, F> Cursor for Join<A, B, F>
where
    A: Cursor,
    B: Cursor<Key = A::Key>,
    A::Key: Ord + Clone,
    F: FnMut(Option<A::Value>, Option<B::Value>) -> Result<V, InternalError>,
{
    type Key = A::Key;
    type Value = V;
    type Seek = A::Seek;

    fn rewind(&mut self) {
        self.error = None;
        self.a.rewind();
        self.b.rewind();
        self.settle();
    }

    fn seek(&mut self, _key: &A::Seek) {
        self.current = None;
        self.error = Some(InternalError::unsupported(
            ErrorOrigin::Cursor,
            "seek is not supported on a join",
        ));
    }

    fn next(&mut self) {
        if !self.valid() {
            return;
        }
        if self.on_a {
            self.a.next();
        }
        if self.on_b {
            self.b.next();
        }
        self.settle();
    }

    fn valid(&self) -> bool {
        self.error.is_none() && self.current.is_some()
    }

    fn key(&self) -> Result<A::Key, InternalError> {
        self.current.clone().ok_or_else(invalid_position)
    }

    fn value(&mut self) -> Result<V, InternalError> {
        if !self.valid() {
            return Err(invalid_position());
        }

        let va = if self.on_a { Some(self.a.value()?) } else { None };
        let vb = if self.on_b { Some(self.b.value()?) } else { None };

        (self.f)(va, vb)
    }

    fn status(&self) -> Result<(), InternalError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.a.status()?;
        self.b.status()
    }

    fn close(&mut self) {
        self.a.close();
        self.b.close();
    }
}
