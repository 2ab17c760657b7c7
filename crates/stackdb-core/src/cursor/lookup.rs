use crate::{
    cursor::{Cursor, invalid_position},
    error::InternalError,
    kv::KvItem,
};
use std::fmt;

///
/// Lookup
///
/// Treats each value of the base cursor as a key into `getter`. The key is
/// read when the cursor lands; the fetched value is cached until the cursor
/// moves.
///

pub struct Lookup<C, G, V>
where
    C: Cursor,
{
    base: C,
    getter: G,
    key: Option<C::Value>,
    cached: Option<V>,
    error: Option<InternalError>,
}

impl<C, G, V> Lookup<C, G, V>
where
    C: Cursor,
    C::Value: Clone,
    G: FnMut(&C::Value) -> Result<V, InternalError>,
    V: Clone,
{
    pub fn new(base: C, getter: G) -> Self {
        let mut lookup = Self {
            base,
            getter,
            key: None,
            cached: None,
            error: None,
        };
        lookup.land();

        lookup
    }

    fn land(&mut self) {
        self.key = None;
        self.cached = None;
        if self.error.is_some() || !self.base.valid() {
            return;
        }

        match self.base.value() {
            Ok(key) => self.key = Some(key),
            Err(err) => self.error = Some(err),
        }
    }
}

impl<C, G, V> fmt::Debug for Lookup<C, G, V>
where
    C: Cursor + fmt::Debug,
    C::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lookup")
            .field("base", &self.base)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<C, G, V> Cursor for Lookup<C, G, V>
where
    C: Cursor,
    C::Value: Clone,
    G: FnMut(&C::Value) -> Result<V, InternalError>,
    V: Clone,
{
    type Key = C::Value;
    type Value = V;
    type Seek = C::Seek;

    fn rewind(&mut self) {
        self.error = None;
        self.base.rewind();
        self.land();
    }

    fn seek(&mut self, key: &C::Seek) {
        self.error = None;
        self.base.seek(key);
        self.land();
    }

    fn next(&mut self) {
        if self.valid() {
            self.base.next();
            self.land();
        }
    }

    fn valid(&self) -> bool {
        self.error.is_none() && self.key.is_some()
    }

    fn key(&self) -> Result<C::Value, InternalError> {
        self.key.clone().ok_or_else(invalid_position)
    }

    fn value(&mut self) -> Result<V, InternalError> {
        if let Some(value) = &self.cached {
            return Ok(value.clone());
        }

        let key = self.key.as_ref().ok_or_else(invalid_position)?;
        let value = (self.getter)(key)?;
        self.cached = Some(value.clone());

        Ok(value)
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
