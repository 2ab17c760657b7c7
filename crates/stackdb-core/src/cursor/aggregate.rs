use crate::{cursor::Cursor, error::InternalError, kv::KvItem};
use std::fmt;

///
/// Aggregate
///
/// Folds every item the cursor lands on into a rolling state. Rewind and
/// seek restart the fold from the initial state; `result` is complete once
/// the cursor is exhausted.
///

pub struct Aggregate<C, S, F> {
    base: C,
    init: S,
    state: S,
    f: F,
    error: Option<InternalError>,
}

impl<C, S, F> Aggregate<C, S, F>
where
    C: Cursor,
    S: Clone,
    F: FnMut(S, &mut C) -> Result<S, InternalError>,
{
    pub fn new(base: C, init: S, f: F) -> Self {
        let mut aggregate = Self {
            base,
            state: init.clone(),
            init,
            f,
            error: None,
        };
        aggregate.fold();

        aggregate
    }

    /// Current fold state.
    pub const fn result(&self) -> &S {
        &self.state
    }

    pub fn into_result(self) -> Result<S, InternalError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.state),
        }
    }

    fn reset(&mut self) {
        self.state = self.init.clone();
        self.error = None;
    }

    fn fold(&mut self) {
        if self.error.is_some() || !self.base.valid() {
            return;
        }

        let state = std::mem::replace(&mut self.state, self.init.clone());
        match (self.f)(state, &mut self.base) {
            Ok(next) => self.state = next,
            Err(err) => self.error = Some(err),
        }
    }
}

impl<C: fmt::Debug, S: fmt::Debug, F> fmt::Debug for Aggregate<C, S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregate")
            .field("base", &self.base)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<C, S, F> Cursor for Aggregate<C, S, F>
where
    C: Cursor,
    S: Clone,
    F: FnMut(S, &mut C) -> Result<S, InternalError>,
{
    type Key = C::Key;
    type Value = C::Value;
    type Seek = C::Seek;

    fn rewind(&mut self) {
        self.reset();
        self.base.rewind();
        self.fold();
    }

    fn seek(&mut self, key: &C::Seek) {
        self.reset();
        self.base.seek(key);
        self.fold();
    }

    fn next(&mut self) {
        if self.valid() {
            self.base.next();
            self.fold();
        }
    }

    fn valid(&self) -> bool {
        self.error.is_none() && self.base.valid()
    }

    fn key(&self) -> Result<C::Key, InternalError> {
        self.base.key()
    }

    fn value(&mut self) -> Result<C::Value, InternalError> {
        self.base.value()
    }

    fn item(&self) -> Option<&KvItem> {
        self.base.item()
    }

    fn status(&self) -> Result<(), InternalError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => self.base.status(),
        }
    }

    fn close(&mut self) {
        self.base.close();
    }
}
