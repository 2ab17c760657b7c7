use crate::{cursor::Cursor, error::InternalError, kv::KvItem};

///
/// Limit
///
/// Yields at most `n` items after each rewind or seek.
///

#[derive(Debug)]
pub struct Limit<C> {
    base: C,
    n: usize,
    taken: usize,
}

impl<C> Limit<C> {
    pub const fn new(base: C, n: usize) -> Self {
        Self { base, n, taken: 0 }
    }
}

impl<C: Cursor> Cursor for Limit<C> {
    type Key = C::Key;
    type Value = C::Value;
    type Seek = C::Seek;

    fn rewind(&mut self) {
        self.taken = 0;
        self.base.rewind();
    }

    fn seek(&mut self, key: &C::Seek) {
        self.taken = 0;
        self.base.seek(key);
    }

    fn next(&mut self) {
        if self.valid() {
            self.taken += 1;
            self.base.next();
        }
    }

    fn valid(&self) -> bool {
        self.taken < self.n && self.base.valid()
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
        self.base.status()
    }

    fn close(&mut self) {
        self.base.close();
    }
}

///
/// Skip
///
/// Drops the first `n` items after each rewind or seek.
///

#[derive(Debug)]
pub struct Skip<C> {
    base: C,
    n: usize,
}

impl<C: Cursor> Skip<C> {
    pub fn new(base: C, n: usize) -> Self {
        let mut skip = Self { base, n };
        skip.drop_head();

        skip
    }

    fn drop_head(&mut self) {
        for _ in 0..self.n {
            if !self.base.valid() {
                break;
            }
            self.base.next();
        }
    }
}

impl<C: Cursor> Cursor for Skip<C> {
    type Key = C::Key;
    type Value = C::Value;
    type Seek = C::Seek;

    fn rewind(&mut self) {
        self.base.rewind();
        self.drop_head();
    }

    fn seek(&mut self, key: &C::Seek) {
        self.base.seek(key);
        self.drop_head();
    }

    fn next(&mut self) {
        self.base.next();
    }

    fn valid(&self) -> bool {
        self.base.valid()
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
        self.base.status()
    }

    fn close(&mut self) {
        self.base.close();
    }
}
