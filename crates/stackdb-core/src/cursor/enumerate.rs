use crate::{
    cursor::{Cursor, invalid_position},
    error::InternalError,
    kv::KvItem,
};

///
/// Enumerate
///
/// Replaces the key with a counter that restarts at 0 on rewind or seek.
///

#[derive(Debug)]
pub struct Enumerate<C> {
    base: C,
    index: usize,
}

impl<C> Enumerate<C> {
    pub const fn new(base: C) -> Self {
        Self { base, index: 0 }
    }
}

impl<C: Cursor> Cursor for Enumerate<C> {
    type Key = usize;
    type Value = C::Value;
    type Seek = C::Seek;

    fn rewind(&mut self) {
        self.index = 0;
        self.base.rewind();
    }

    fn seek(&mut self, key: &C::Seek) {
        self.index = 0;
        self.base.seek(key);
    }

    fn next(&mut self) {
        if self.base.valid() {
            self.index += 1;
            self.base.next();
        }
    }

    fn valid(&self) -> bool {
        self.base.valid()
    }

    fn key(&self) -> Result<usize, InternalError> {
        if self.base.valid() {
            Ok(self.index)
        } else {
            Err(invalid_position())
        }
    }

    fn value(&mut self) -> Result<C::Value, InternalError> {
        self.base.value()
    }

    fn item(&self) -> Option<&KvItem> {
        self.base.item()
    }

    fn status(&self) -> Result<(), InternalError> {
        self.base.status()
    }

    fn close(&mut self) {
        self.base.close();
    }
}
