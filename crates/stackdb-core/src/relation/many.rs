use crate::{
    cursor::Cursor,
    error::{ErrorOrigin, InternalError},
    ext::{ExtContext, Extension, SetOptions},
    kv::{IteratorOptions, KvItem, Transaction},
    record::{Record, RecordStore, WeakRecordStore},
    reference::{RefCursor, RefEntry, RefInstance, RefStore},
    relation::{peers, store_dropped},
    serialize::{CborCodec, Codec},
};
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt, sync::Arc};

///
/// RelationKey
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelationKey<L, R> {
    pub left: L,
    pub right: R,
}

impl<L, R> RelationKey<L, R> {
    pub const fn new(left: L, right: R) -> Self {
        Self { left, right }
    }
}

// L2R lives in the right store's extension space and carries the data:
// prefix part is the right key, key part the left key. R2L mirrors it in the
// left store's space without data.
struct Shared<L: Record, R: Record, D> {
    name: String,
    left: WeakRecordStore<L>,
    right: WeakRecordStore<R>,
    l2r: RefStore,
    r2l: RefStore,
    codec: Arc<dyn Codec<D>>,
}

impl<L: Record, R: Record, D> Shared<L, R, D> {
    fn stores(&self) -> Result<(RecordStore<L>, RecordStore<R>), InternalError> {
        let dropped = || store_dropped("relation", &self.name);

        Ok((
            self.left.upgrade().ok_or_else(dropped)?,
            self.right.upgrade().ok_or_else(dropped)?,
        ))
    }

    fn unlink(
        &self,
        txn: &dyn Transaction,
        left: &[u8],
        right: &[u8],
    ) -> Result<(), InternalError> {
        self.l2r.instance(txn).delete_ref(right, left)?;
        self.r2l.instance(txn).delete_ref(left, right)
    }
}

///
/// LeftSide
///

struct LeftSide<L: Record, R: Record, D> {
    shared: Arc<Shared<L, R, D>>,
}

impl<L: Record, R: Record, D> Extension<L> for LeftSide<L, R, D> {
    fn on_set(
        &self,
        _ctx: &ExtContext<'_>,
        _key: &[u8],
        _old: Option<&L>,
        _new: &L,
        _opts: &SetOptions,
    ) -> Result<(), InternalError> {
        Ok(())
    }

    fn on_delete(&self, ctx: &ExtContext<'_>, key: &[u8], _value: &L) -> Result<(), InternalError> {
        let txn = ctx.txn();
        for right in peers(&self.shared.r2l.instance(txn), key)? {
            self.shared.unlink(txn, key, &right)?;
        }

        Ok(())
    }
}

///
/// RightSide
///

struct RightSide<L: Record, R: Record, D> {
    shared: Arc<Shared<L, R, D>>,
}

impl<L: Record, R: Record, D> Extension<R> for RightSide<L, R, D> {
    fn on_set(
        &self,
        _ctx: &ExtContext<'_>,
        _key: &[u8],
        _old: Option<&R>,
        _new: &R,
        _opts: &SetOptions,
    ) -> Result<(), InternalError> {
        Ok(())
    }

    fn on_delete(&self, ctx: &ExtContext<'_>, key: &[u8], _value: &R) -> Result<(), InternalError> {
        let txn = ctx.txn();
        for left in peers(&self.shared.l2r.instance(txn), key)? {
            self.shared.unlink(txn, &left, key)?;
        }

        Ok(())
    }
}

///
/// Relation
///
/// Many-to-many link between two record stores, each pair carrying data of
/// type `D`. Deleting either endpoint removes its pairs.
///

pub struct Relation<L: Record, R: Record, D> {
    shared: Arc<Shared<L, R, D>>,
}

impl<L, R, D> Relation<L, R, D>
where
    L: Record,
    R: Record,
    D: Serialize + DeserializeOwned + 'static,
{
    /// Install with pair data stored as CBOR.
    pub fn install(
        name: impl Into<String>,
        left: &RecordStore<L>,
        right: &RecordStore<R>,
    ) -> Result<Self, InternalError> {
        Self::install_with_codec(name, left, right, CborCodec::shared::<D>())
    }
}

impl<L: Record, R: Record, D: 'static> Relation<L, R, D> {
    /// Register both sides on stores that hold no data yet.
    pub fn install_with_codec(
        name: impl Into<String>,
        left: &RecordStore<L>,
        right: &RecordStore<R>,
        codec: Arc<dyn Codec<D>>,
    ) -> Result<Self, InternalError> {
        let name = name.into();
        let shared = Arc::new(Shared {
            l2r: RefStore::new(right.ext().extension_store(&name)?),
            r2l: RefStore::new(left.ext().extension_store(&name)?),
            name: name.clone(),
            left: left.downgrade(),
            right: right.downgrade(),
            codec,
        });

        left.ext().register(
            name.clone(),
            Arc::new(LeftSide {
                shared: Arc::clone(&shared),
            }),
        )?;
        right.ext().register(
            name,
            Arc::new(RightSide {
                shared: Arc::clone(&shared),
            }),
        )?;

        Ok(Self { shared })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[must_use]
    pub fn instance<'a>(&self, txn: &'a dyn Transaction) -> RelationInstance<'a, L, R, D> {
        RelationInstance {
            shared: Arc::clone(&self.shared),
            txn,
        }
    }
}

impl<L: Record, R: Record, D> Clone for Relation<L, R, D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<L: Record, R: Record, D> fmt::Debug for Relation<L, R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

///
/// RelationInstance
///

pub struct RelationInstance<'a, L: Record, R: Record, D> {
    shared: Arc<Shared<L, R, D>>,
    txn: &'a dyn Transaction,
}

impl<'a, L: Record, R: Record, D> RelationInstance<'a, L, R, D> {
    /// Link both endpoints, replacing the data of an existing pair.
    pub fn set(&self, key: &RelationKey<L::Id, R::Id>, data: &D) -> Result<(), InternalError> {
        let (left, right) = self.shared.stores()?;
        if !left.instance(self.txn).exists(&key.left)? {
            return Err(self.missing("left"));
        }
        if !right.instance(self.txn).exists(&key.right)? {
            return Err(self.missing("right"));
        }

        let (lk, rk) = self.keys(key)?;
        let value = self.shared.codec.marshal(data)?;
        self.shared
            .l2r
            .instance(self.txn)
            .set(&lk, RefEntry::new(rk.clone()).with_value(value))?;
        self.shared.r2l.instance(self.txn).set(&rk, RefEntry::new(lk))
    }

    pub fn get(&self, key: &RelationKey<L::Id, R::Id>) -> Result<D, InternalError> {
        let (lk, rk) = self.keys(key)?;
        let item = self
            .shared
            .l2r
            .instance(self.txn)
            .get_exact(&rk, &lk)?
            .ok_or_else(|| self.no_pair())?;

        self.shared.codec.unmarshal(&item.value.unwrap_or_default())
    }

    pub fn exists(&self, key: &RelationKey<L::Id, R::Id>) -> Result<bool, InternalError> {
        let (lk, rk) = self.keys(key)?;

        self.shared.l2r.instance(self.txn).exists(&rk, &lk)
    }

    pub fn delete(&self, key: &RelationKey<L::Id, R::Id>) -> Result<(), InternalError> {
        if !self.exists(key)? {
            return Err(self.no_pair());
        }

        let (lk, rk) = self.keys(key)?;
        self.shared.unlink(self.txn, &lk, &rk)
    }

    /// Every pair, ordered by right key then left key.
    pub fn iter(&self, reverse: bool) -> Result<RelationCursor<'a, L, R, D>, InternalError> {
        let opts = IteratorOptions::default().reversed(reverse);
        let base = self.shared.l2r.instance(self.txn).new_iterator(&opts);

        self.cursor(base, None, false)
    }

    /// Pairs whose left endpoint is `left`, ordered by right key.
    pub fn iter_left(
        &self,
        left: &L::Id,
        reverse: bool,
    ) -> Result<RelationCursor<'a, L, R, D>, InternalError> {
        let (store, _) = self.shared.stores()?;
        let lk = store.encode_id(left)?;
        let opts = IteratorOptions::prefix(lk.clone()).reversed(reverse);
        let base = self.shared.r2l.instance(self.txn).new_iterator(&opts);

        self.cursor(base, Some(lk), true)
    }

    /// Pairs whose right endpoint is `right`, ordered by left key.
    pub fn iter_right(
        &self,
        right: &R::Id,
        reverse: bool,
    ) -> Result<RelationCursor<'a, L, R, D>, InternalError> {
        let (_, store) = self.shared.stores()?;
        let rk = store.encode_id(right)?;
        let opts = IteratorOptions::prefix(rk.clone()).reversed(reverse);
        let base = self.shared.l2r.instance(self.txn).new_iterator(&opts);

        self.cursor(base, Some(rk), false)
    }

    fn cursor(
        &self,
        base: RefCursor<'a>,
        exact: Option<Vec<u8>>,
        left_first: bool,
    ) -> Result<RelationCursor<'a, L, R, D>, InternalError> {
        let (left, right) = self.shared.stores()?;
        let mut cursor = RelationCursor {
            base,
            exact,
            left_first,
            l2r: self.shared.l2r.instance(self.txn),
            left,
            right,
            codec: Arc::clone(&self.shared.codec),
        };
        cursor.settle();

        Ok(cursor)
    }

    fn keys(&self, key: &RelationKey<L::Id, R::Id>) -> Result<(Vec<u8>, Vec<u8>), InternalError> {
        let (left, right) = self.shared.stores()?;

        Ok((left.encode_id(&key.left)?, right.encode_id(&key.right)?))
    }

    fn missing(&self, side: &str) -> InternalError {
        InternalError::integrity(
            ErrorOrigin::Relation,
            format!("relation '{}': {side} record not found", self.shared.name),
        )
    }

    fn no_pair(&self) -> InternalError {
        InternalError::not_found(
            ErrorOrigin::Relation,
            format!("relation '{}': no such pair", self.shared.name),
        )
    }
}

impl<L: Record, R: Record, D> fmt::Debug for RelationInstance<'_, L, R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationInstance")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

///
/// RelationCursor
///
/// Pairs of a relation as typed keys with their data. `seek` takes a
/// physical ref key (prefix part first).
///

pub struct RelationCursor<'a, L: Record, R: Record, D> {
    base: RefCursor<'a>,
    exact: Option<Vec<u8>>,
    left_first: bool,
    l2r: RefInstance<'a>,
    left: RecordStore<L>,
    right: RecordStore<R>,
    codec: Arc<dyn Codec<D>>,
}

impl<L: Record, R: Record, D> RelationCursor<'_, L, R, D> {
    // Skip entries whose prefix part only starts with the requested key.
    fn settle(&mut self) {
        let Some(exact) = &self.exact else {
            return;
        };
        while self.base.valid() {
            match self.base.key() {
                Ok(prefix) if prefix != *exact => self.base.next(),
                _ => break,
            }
        }
    }

    fn parts(&self) -> Result<(Vec<u8>, Vec<u8>), InternalError> {
        let entry = self.base.entry()?;

        Ok(if self.left_first {
            (entry.prefix, entry.key)
        } else {
            (entry.key, entry.prefix)
        })
    }
}

impl<L: Record, R: Record, D> fmt::Debug for RelationCursor<'_, L, R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationCursor")
            .field("base", &self.base)
            .field("left_first", &self.left_first)
            .finish_non_exhaustive()
    }
}

impl<L: Record, R: Record, D> Cursor for RelationCursor<'_, L, R, D> {
    type Key = RelationKey<L::Id, R::Id>;
    type Value = D;
    type Seek = [u8];

    fn rewind(&mut self) {
        self.base.rewind();
        self.settle();
    }

    fn seek(&mut self, key: &[u8]) {
        self.base.seek(key);
        self.settle();
    }

    fn next(&mut self) {
        self.base.next();
        self.settle();
    }

    fn valid(&self) -> bool {
        self.base.valid()
    }

    fn key(&self) -> Result<Self::Key, InternalError> {
        let (lk, rk) = self.parts()?;

        Ok(RelationKey::new(
            self.left.decode_id(&lk)?,
            self.right.decode_id(&rk)?,
        ))
    }

    fn value(&mut self) -> Result<D, InternalError> {
        let data = if self.left_first {
            let (lk, rk) = self.parts()?;
            self.l2r
                .get_exact(&rk, &lk)?
                .ok_or_else(|| {
                    InternalError::integrity(ErrorOrigin::Relation, "mirror entry without pair")
                })?
                .value
        } else {
            self.base.data()?
        };

        self.codec.unmarshal(&data.unwrap_or_default())
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
