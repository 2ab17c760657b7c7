use crate::{
    cursor::{Cursor, invalid_position},
    error::InternalError,
};

///
/// Slice
///
/// Cursor over an owned vector; the key is the element index and `seek`
/// interprets its argument as an index.
///

#[derive(Clone, Debug)]
pub struct Slice<T> {
    items: Vec<T>,
    pos: usize,
}

impl<T> Slice<T> {
    #[must_use]
    pub const fn new(items: Vec<T>) -> Self {
        Self { items, pos: 0 }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> From<Vec<T>> for Slice<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: Clone> Cursor for Slice<T> {
    type Key = usize;
    type Value = T;
    type Seek = usize;

    fn rewind(&mut self) {
        self.pos = 0;
    }

    fn seek(&mut self, key: &usize) {
        self.pos = *key;
    }

    fn next(&mut self) {
        if self.pos < self.items.len() {
            self.pos += 1;
        }
    }

    fn valid(&self) -> bool {
        self.pos < self.items.len()
    }

    fn key(&self) -> Result<usize, InternalError> {
        if self.valid() {
            Ok(self.pos)
        } else {
            Err(invalid_position())
        }
    }

    fn value(&mut self) -> Result<T, InternalError> {
        self.items.get(self.pos).cloned().ok_or_else(invalid_position)
    }
}
