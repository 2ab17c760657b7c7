use crate::{
    cursor::{Cursor, severed},
    error::InternalError,
    kv::KvItem,
};
use std::fmt;

///
/// Sever
///
/// Passes base items through until `pred` first holds, then stays invalid
/// until the next rewind or seek. Reading a value from a severed cursor is
/// an integrity error.
///

pub struct Sever<C, P> {
    base: C,
    pred: P,
    severed: bool,
    error: Option<InternalError>,
}

impl<C, P> Sever<C, P>
where
    C: Cursor,
    P: FnMut(&mut C) -> Result<bool, InternalError>,
{
    pub fn new(base: C, pred: P) -> Self {
        let mut sever = Self {
            base,
            pred,
            severed: false,
            error: None,
        };
        sever.check();

        sever
    }

    #[must_use]
    pub const fn is_severed(&self) -> bool {
        self.severed
    }

    fn check(&mut self) {
        if self.severed || self.error.is_some() || !self.base.valid() {
            return;
        }

        match (self.pred)(&mut self.base) {
            Ok(cut) => self.severed = cut,
            Err(err) => self.error = Some(err),
        }
    }

    fn reset(&mut self) {
        self.severed = false;
        self.error = None;
    }
}

impl<C: fmt::Debug, P> fmt::Debug for Sever<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sever")
            .field("base", &self.base)
            .field("severed", &self.severed)
            .finish_non_exhaustive()
    }
}

impl<C, P> Cursor for Sever<C, P>
where
    C: Cursor,
    P: FnMut(&mut C) -> Result<bool, InternalError>,
{
    type Key = C::Key;
    type Value = C::Value;
    type Seek = C::Seek;

    fn rewind(&mut self) {
        self.reset();
        self.base.rewind();
        self.check();
    }

    fn seek(&mut self, key: &C::Seek) {
        self.reset();
        self.base.seek(key);
        self.check();
    }

    fn next(&mut self) {
        if self.valid() {
            self.base.next();
            self.check();
        }
    }

    fn valid(&self) -> bool {
        !self.severed && self.error.is_none() && self.base.valid()
    }

    fn key(&self) -> Result<C::Key, InternalError> {
        if self.severed {
            return Err(severed());
        }
        self.base.key()
    }

    fn value(&mut self) -> Result<C::Value, InternalError> {
        if self.severed {
            return Err(severed());
        }
        self.base.value()
    }

    fn item(&self) -> Option<&KvItem> {
        if self.severed {
            None
        } else {
            self.base.item()
        }
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
