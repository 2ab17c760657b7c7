use crate::{
    cursor::{Cursor, invalid_position},
    error::InternalError,
    kv::KvItem,
};
use std::fmt;

///
/// Flatten
///
/// Walks an outer cursor whose values are cursors and yields the items of
/// each inner cursor in turn. Exhausted inners are closed before the outer
/// advances. `seek` positions the first inner that has an item at or after
/// the key; later inners start from their beginning.
///

pub struct Flatten<O>
where
    O: Cursor,
    O::Value: Cursor,
{
    outer: O,
    current: Option<O::Value>,
    error: Option<InternalError>,
}

impl<O> Flatten<O>
where
    O: Cursor,
    O::Value: Cursor,
{
    pub fn new(outer: O) -> Self {
        let mut flatten = Self {
            outer,
            current: None,
            error: None,
        };
        flatten.open(None);

        flatten
    }

    fn close_current(&mut self) {
        if let Some(mut inner) = self.current.take() {
            inner.close();
        }
    }

    // Open inners from the outer position until one has an item.
    fn open(&mut self, seek: Option<&<O::Value as Cursor>::Seek>) {
        while self.error.is_none() && self.outer.valid() {
            let mut inner = match self.outer.value() {
                Ok(inner) => inner,
                Err(err) => {
                    self.error = Some(err);
                    return;
                }
            };

            match seek {
                Some(key) => inner.seek(key),
                None => inner.rewind(),
            }

            if inner.valid() {
                self.current = Some(inner);
                return;
            }

            if let Err(err) = inner.status() {
                self.error = Some(err);
            }
            inner.close();
            self.outer.next();
        }
    }
}

impl<O> fmt::Debug for Flatten<O>
where
    O: Cursor + fmt::Debug,
    O::Value: Cursor,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flatten")
            .field("outer", &self.outer)
            .field("open", &self.current.is_some())
            .finish_non_exhaustive()
    }
}

impl<O> Cursor for Flatten<O>
where
    O: Cursor,
    O::Value: Cursor,
{
    type Key = <O::Value as Cursor>::Key;
    type Value = <O::Value as Cursor>::Value;
    type Seek = <O::Value as Cursor>::Seek;

    fn rewind(&mut self) {
        self.close_current();
        self.error = None;
        self.outer.rewind();
        self.open(None);
    }

    fn seek(&mut self, key: &Self::Seek) {
        self.close_current();
        self.error = None;
        self.outer.rewind();
        self.open(Some(key));
    }

    fn next(&mut self) {
        let Some(inner) = self.current.as_mut() else {
            return;
        };

        inner.next();
        if inner.valid() {
            return;
        }

        if let Err(err) = inner.status() {
            self.error = Some(err);
        }
        self.close_current();
        self.outer.next();
        self.open(None);
    }

    fn valid(&self) -> bool {
        self.error.is_none() && self.current.is_some()
    }

    fn key(&self) -> Result<Self::Key, InternalError> {
        self.current.as_ref().ok_or_else(invalid_position)?.key()
    }

    fn value(&mut self) -> Result<Self::Value, InternalError> {
        self.current.as_mut().ok_or_else(invalid_position)?.value()
    }

    fn item(&self) -> Option<&KvItem> {
        self.current.as_ref().and_then(Cursor::item)
    }

    fn status(&self) -> Result<(), InternalError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => self.outer.status(),
        }
    }

    fn close(&mut self) {
        self.close_current();
        self.outer.close();
    }
}
