use crate::{cursor::Cursor, error::InternalError, kv::KvItem};
use std::fmt;

///
/// Filter
///
/// Skips base items failing `pred`. Positioning advances the base until a
/// match or exhaustion; a predicate error stops the cursor and is kept in
/// `status`.
///

pub struct Filter<C, P> {
    base: C,
    pred: P,
    error: Option<InternalError>,
}

impl<C, P> Filter<C, P>
where
    C: Cursor,
    P: FnMut(&mut C) -> Result<bool, InternalError>,
{
    pub fn new(base: C, pred: P) -> Self {
        let mut filter = Self {
            base,
            pred,
            error: None,
        };
        filter.settle();

        filter
    }

    fn settle(&mut self) {
        while self.error.is_none() && self.base.valid() {
            match (self.pred)(&mut self.base) {
                Ok(true) => break,
                Ok(false) => self.base.next(),
                Err(err) => self.error = Some(err),
            }
        }
    }
}

impl<C: fmt::Debug, P> fmt::Debug for Filter<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("base", &self.base)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<C, P> Cursor for Filter<C, P>
where
    C: Cursor,
    P: FnMut(&mut C) -> Result<bool, InternalError>,
{
    type Key = C::Key;
    type Value = C::Value;
    type Seek = C::Seek;

    fn rewind(&mut self) {
        self.error = None;
        self.base.rewind();
        self.settle();
    }

    fn seek(&mut self, key: &C::Seek) {
        self.error = None;
        self.base.seek(key);
        self.settle();
    }

    fn next(&mut self) {
        if self.error.is_none() {
            self.base.next();
            self.settle();
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
