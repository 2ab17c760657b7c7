use crate::{cursor::Cursor, error::InternalError, kv::KvItem};
use std::{borrow::Borrow, fmt};

///
/// RewindSeek
///
/// Turns `rewind` into `seek(key)`, giving a lower bound to a cursor that
/// has none.
///

pub struct RewindSeek<C>
where
    C: Cursor,
    C::Seek: ToOwned,
{
    base: C,
    key: <C::Seek as ToOwned>::Owned,
}

impl<C> RewindSeek<C>
where
    C: Cursor,
    C::Seek: ToOwned,
{
    pub fn new(mut base: C, key: &C::Seek) -> Self {
        base.seek(key);

        Self {
            base,
            key: key.to_owned(),
        }
    }
}

impl<C> fmt::Debug for RewindSeek<C>
where
    C: Cursor + fmt::Debug,
    C::Seek: ToOwned,
    <C::Seek as ToOwned>::Owned: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewindSeek")
            .field("base", &self.base)
            .field("key", &self.key)
            .finish()
    }
}

impl<C> Cursor for RewindSeek<C>
where
    C: Cursor,
    C::Seek: ToOwned,
{
    type Key = C::Key;
    type Value = C::Value;
    type Seek = C::Seek;

    fn rewind(&mut self) {
        let key: &C::Seek = self.key.borrow();
        self.base.seek(key);
    }

    fn seek(&mut self, key: &C::Seek) {
        self.base.seek(key);
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
