use crate::{cursor::Cursor, error::InternalError, kv::KvItem};
use std::fmt;

///
/// Map
///
/// Re-keys and re-values a cursor. The key function sees the base key; the
/// value function sees the whole base cursor (key, value and raw item) and
/// only runs when `value` is asked for. Validity is the base's.
///

pub struct Map<C, KF, VF> {
    base: C,
    key_fn: KF,
    value_fn: VF,
}

impl<C, KF, VF> Map<C, KF, VF> {
    pub const fn new(base: C, key_fn: KF, value_fn: VF) -> Self {
        Self {
            base,
            key_fn,
            value_fn,
        }
    }

    pub const fn base(&self) -> &C {
        &self.base
    }
}

impl<C: fmt::Debug, KF, VF> fmt::Debug for Map<C, KF, VF> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map").field("base", &self.base).finish_non_exhaustive()
    }
}

impl<C, K, V, KF, VF> Cursor for Map<C, KF, VF>
where
    C: Cursor,
    KF: Fn(C::Key) -> Result<K, InternalError>,
    VF: FnMut(&mut C) -> Result<V, InternalError>,
{
    type Key = K;
    type Value = V;
    type Seek = C::Seek;

    fn rewind(&mut self) {
        self.base.rewind();
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

    fn key(&self) -> Result<K, InternalError> {
        (self.key_fn)(self.base.key()?)
    }

    fn value(&mut self) -> Result<V, InternalError> {
        (self.value_fn)(&mut self.base)
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
