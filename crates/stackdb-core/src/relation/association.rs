use crate::{
    cursor::{Cursor, CursorExt, Lookup, count},
    error::{ErrorOrigin, InternalError},
    ext::{ExtContext, Extension, SetOptions},
    kv::{IteratorOptions, Transaction},
    range::RangeCursor,
    record::{Record, RecordCursor, RecordId, RecordStore, WeakRecordStore},
    reference::{RefEntry, RefInstance, RefStore},
    relation::{peers, store_dropped},
};
use std::{fmt, sync::Arc};

const P2C: &[u8] = b"p";
const C2P: &[u8] = b"c";

///
/// Children
///
/// Records to store as children of the parent being set. Pass it with
/// `SetOptions::with`; each child is written through the child store.
///

#[derive(Clone, Debug)]
pub struct Children<C>(pub Vec<C>);

///
/// ParentId
///
/// Parent of the child being set, for associations without an extractor.
///

#[derive(Clone, Debug)]
pub struct ParentId<I>(pub I);

// Set by the parent side when it writes children.
#[derive(Debug)]
struct ParentLink {
    key: Vec<u8>,
    skip_check: bool,
}

type PidFn<P, C> = Arc<dyn Fn(&C) -> <P as Record>::Id + Send + Sync>;

struct Shared<P: Record, C: Record> {
    name: String,
    parents: WeakRecordStore<P>,
    children: WeakRecordStore<C>,
    p2c: RefStore,
    c2p: RefStore,
    pid_fn: Option<PidFn<P, C>>,
    allow_orphans: bool,
}

impl<P: Record, C: Record> Shared<P, C> {
    fn parents(&self) -> Result<RecordStore<P>, InternalError> {
        self.parents
            .upgrade()
            .ok_or_else(|| store_dropped("association", &self.name))
    }

    fn children(&self) -> Result<RecordStore<C>, InternalError> {
        self.children
            .upgrade()
            .ok_or_else(|| store_dropped("association", &self.name))
    }

    /// Encoded parent key the extractor yields for `child`, if any.
    fn extracted(&self, pid_fn: &PidFn<P, C>, child: &C) -> Result<Option<Vec<u8>>, InternalError> {
        let id = pid_fn(child);
        if id.is_zero() {
            return Ok(None);
        }

        self.parents()?.encode_id(&id).map(Some)
    }

    /// Current parent key of a stored child.
    fn parent_key(
        &self,
        txn: &dyn Transaction,
        key: &[u8],
        child: &C,
    ) -> Result<Option<Vec<u8>>, InternalError> {
        match &self.pid_fn {
            Some(pid_fn) => self.extracted(pid_fn, child),
            None => linked(&self.c2p.instance(txn), key),
        }
    }

    fn link(
        &self,
        txn: &dyn Transaction,
        parent: &[u8],
        child: &[u8],
    ) -> Result<(), InternalError> {
        self.p2c.instance(txn).set(child, RefEntry::new(parent))?;
        if self.pid_fn.is_none() {
            self.c2p.instance(txn).set(parent, RefEntry::new(child))?;
        }

        Ok(())
    }

    fn unlink(
        &self,
        txn: &dyn Transaction,
        parent: &[u8],
        child: &[u8],
    ) -> Result<(), InternalError> {
        self.p2c.instance(txn).delete_ref(parent, child)?;
        if self.pid_fn.is_none() {
            self.c2p.instance(txn).delete_ref(child, parent)?;
        }

        Ok(())
    }

    fn check_parent(&self, txn: &dyn Transaction, parent: &[u8]) -> Result<(), InternalError> {
        if self.parents()?.ext().instance(txn).exists(parent)? {
            return Ok(());
        }

        Err(
            InternalError::integrity(ErrorOrigin::Relation, "parent record not found")
                .context("failed to get parent"),
        )
    }
}

fn linked(c2p: &RefInstance<'_>, child: &[u8]) -> Result<Option<Vec<u8>>, InternalError> {
    match c2p.get(child) {
        Ok(parent) => Ok(Some(parent)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

///
/// ParentSide
///

struct ParentSide<P: Record, C: Record> {
    shared: Arc<Shared<P, C>>,
}

impl<P: Record, C: Record> Extension<P> for ParentSide<P, C> {
    fn on_set(
        &self,
        ctx: &ExtContext<'_>,
        key: &[u8],
        _old: Option<&P>,
        _new: &P,
        opts: &SetOptions,
    ) -> Result<(), InternalError> {
        let Some(Children(children)) = opts.find::<Children<C>>() else {
            return Ok(());
        };

        let store = self.shared.children()?;
        let instance = store.instance(ctx.txn());
        let link = SetOptions::new().with_ext(
            self.shared.name.clone(),
            ParentLink {
                key: key.to_vec(),
                skip_check: true,
            },
        );
        for child in children {
            instance
                .set_with(&mut child.clone(), &link)
                .map_err(|err| err.context("failed to set child"))?;
        }

        Ok(())
    }

    fn on_delete(&self, ctx: &ExtContext<'_>, key: &[u8], _value: &P) -> Result<(), InternalError> {
        let txn = ctx.txn();
        let store = self.shared.children()?;
        let children = store.ext().instance(txn);

        for child in peers(&self.shared.p2c.instance(txn), key)? {
            match children.delete(&child) {
                Ok(()) => {}
                Err(err) if err.is_not_found() => self.shared.unlink(txn, key, &child)?,
                Err(err) => return Err(err.context("failed to delete child")),
            }
        }

        Ok(())
    }
}

///
/// ChildSide
///

struct ChildSide<P: Record, C: Record> {
    shared: Arc<Shared<P, C>>,
}

impl<P: Record, C: Record> ChildSide<P, C> {
    /// Parent the write asks for, and whether its existence is already known.
    fn target(
        &self,
        new: &C,
        opts: &SetOptions,
        current: Option<&Vec<u8>>,
    ) -> Result<(Option<Vec<u8>>, bool), InternalError> {
        if let Some(pid_fn) = &self.shared.pid_fn {
            return Ok((self.shared.extracted(pid_fn, new)?, false));
        }
        if let Some(link) = opts.find::<ParentLink>() {
            return Ok((Some(link.key.clone()), link.skip_check));
        }
        if let Some(ParentId(id)) = opts.find::<ParentId<P::Id>>() {
            return Ok((Some(self.shared.parents()?.encode_id(id)?), false));
        }

        Ok((current.cloned(), true))
    }
}

impl<P: Record, C: Record> Extension<C> for ChildSide<P, C> {
    fn on_set(
        &self,
        ctx: &ExtContext<'_>,
        key: &[u8],
        old: Option<&C>,
        new: &C,
        opts: &SetOptions,
    ) -> Result<(), InternalError> {
        let txn = ctx.txn();
        let current = match (&self.shared.pid_fn, old) {
            (Some(_), None) => None,
            (Some(pid_fn), Some(old)) => self.shared.extracted(pid_fn, old)?,
            (None, _) => linked(&self.shared.c2p.instance(txn), key)?,
        };
        let (target, known) = self.target(new, opts, current.as_ref())?;

        let lenient = self.shared.allow_orphans || opts.is_initializing();
        match &target {
            Some(parent) if !(known || lenient) => self.shared.check_parent(txn, parent)?,
            None if !lenient => {
                return Err(InternalError::integrity(
                    ErrorOrigin::Relation,
                    "failed to get parent: child has no parent id",
                ));
            }
            _ => {}
        }

        if current != target {
            if let Some(parent) = &current {
                self.shared.unlink(txn, parent, key)?;
            }
            if let Some(parent) = &target {
                self.shared.link(txn, parent, key)?;
            }
        }

        Ok(())
    }

    fn on_delete(&self, ctx: &ExtContext<'_>, key: &[u8], value: &C) -> Result<(), InternalError> {
        let txn = ctx.txn();
        match self.shared.parent_key(txn, key, value)? {
            Some(parent) => self.shared.unlink(txn, &parent, key),
            None => Ok(()),
        }
    }
}

///
/// Association
///
/// One-to-many link from parent records to child records. Deleting a parent
/// deletes its children through the child store; children must name an
/// existing parent unless orphans are allowed.
///

pub struct Association<P: Record, C: Record> {
    shared: Arc<Shared<P, C>>,
}

impl<P: Record, C: Record> Association<P, C> {
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        parents: &RecordStore<P>,
        children: &RecordStore<C>,
    ) -> AssociationBuilder<P, C> {
        AssociationBuilder {
            name: name.into(),
            parents: parents.clone(),
            children: children.clone(),
            pid_fn: None,
            allow_orphans: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[must_use]
    pub fn instance<'a>(&self, txn: &'a dyn Transaction) -> AssociationInstance<'a, P, C> {
        AssociationInstance {
            shared: Arc::clone(&self.shared),
            txn,
        }
    }
}

impl<P: Record, C: Record> Clone for Association<P, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Record, C: Record> fmt::Debug for Association<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("name", &self.shared.name)
            .field("allow_orphans", &self.shared.allow_orphans)
            .field("pid_fn", &self.shared.pid_fn.is_some())
            .finish_non_exhaustive()
    }
}

///
/// AssociationBuilder
///

pub struct AssociationBuilder<P: Record, C: Record> {
    name: String,
    parents: RecordStore<P>,
    children: RecordStore<C>,
    pid_fn: Option<PidFn<P, C>>,
    allow_orphans: bool,
}

impl<P: Record, C: Record> AssociationBuilder<P, C> {
    /// Accept children whose parent does not exist.
    #[must_use]
    pub const fn allow_orphans(mut self) -> Self {
        self.allow_orphans = true;
        self
    }

    /// Read the parent id from the child itself; a zero id means no parent.
    /// With an extractor no inverse refs are kept and `ParentId` options are
    /// ignored.
    #[must_use]
    pub fn with_pid_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&C) -> P::Id + Send + Sync + 'static,
    {
        self.pid_fn = Some(Arc::new(f));
        self
    }

    /// Register both sides on stores that hold no data yet.
    pub fn install(self) -> Result<Association<P, C>, InternalError> {
        let shared = self.shared()?;
        self.parents.ext().register(
            self.name.clone(),
            Arc::new(ParentSide {
                shared: Arc::clone(&shared),
            }),
        )?;
        self.children.ext().register(
            self.name.clone(),
            Arc::new(ChildSide {
                shared: Arc::clone(&shared),
            }),
        )?;

        Ok(Association { shared })
    }

    /// Register both sides on populated stores, backfilling inside `txn`;
    /// returns the association and the number of children replayed.
    pub fn attach(
        self,
        txn: &dyn Transaction,
    ) -> Result<(Association<P, C>, usize), InternalError> {
        let shared = self.shared()?;
        self.parents.ext().instance(txn).add_extension(
            self.name.clone(),
            Arc::new(ParentSide {
                shared: Arc::clone(&shared),
            }),
        )?;
        let replayed = self.children.ext().instance(txn).add_extension(
            self.name.clone(),
            Arc::new(ChildSide {
                shared: Arc::clone(&shared),
            }),
        )?;

        Ok((Association { shared }, replayed))
    }

    fn shared(&self) -> Result<Arc<Shared<P, C>>, InternalError> {
        let space = self.children.ext().extension_store(&self.name)?;

        Ok(Arc::new(Shared {
            name: self.name.clone(),
            parents: self.parents.downgrade(),
            children: self.children.downgrade(),
            p2c: RefStore::new(space.prefixed(P2C)),
            c2p: RefStore::new(space.prefixed(C2P)),
            pid_fn: self.pid_fn.clone(),
            allow_orphans: self.allow_orphans,
        }))
    }
}

impl<P: Record, C: Record> fmt::Debug for AssociationBuilder<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationBuilder")
            .field("name", &self.name)
            .field("allow_orphans", &self.allow_orphans)
            .finish_non_exhaustive()
    }
}

///
/// AssociationInstance
///

pub struct AssociationInstance<'a, P: Record, C: Record> {
    shared: Arc<Shared<P, C>>,
    txn: &'a dyn Transaction,
}

impl<'a, P: Record, C: Record> AssociationInstance<'a, P, C> {
    pub fn get_parent_id(&self, child: &C::Id) -> Result<P::Id, InternalError> {
        let children = self.shared.children()?;
        let key = children.encode_id(child)?;
        let record = match &self.shared.pid_fn {
            Some(_) => Some(children.instance(self.txn).get(child)?),
            None => None,
        };
        let parent = match record {
            Some(record) => self.shared.parent_key(self.txn, &key, &record)?,
            None => linked(&self.shared.c2p.instance(self.txn), &key)?,
        };

        let parent = parent.ok_or_else(|| {
            InternalError::not_found(
                ErrorOrigin::Relation,
                format!("association '{}': child has no parent", self.shared.name),
            )
        })?;
        self.shared.parents()?.decode_id(&parent)
    }

    pub fn get_parent(&self, child: &C::Id) -> Result<P, InternalError> {
        let parent = self.get_parent_id(child)?;

        self.shared
            .parents()?
            .instance(self.txn)
            .get(&parent)
            .map_err(|err| err.context("failed to get parent"))
    }

    /// Children of `parent` in child-key order, fetched lazily.
    pub fn children_iterator(
        &self,
        parent: &P::Id,
        reverse: bool,
    ) -> Result<RecordCursor<'a, C>, InternalError> {
        let children = self.shared.children()?;
        let links = self.links(parent, reverse)?;
        let data = children.ext().data().instance(self.txn);

        Ok(children
            .instance(self.txn)
            .typed(Lookup::new(links, move |key: &Vec<u8>| data.get(key))))
    }

    pub fn children_count(&self, parent: &P::Id) -> Result<usize, InternalError> {
        count(&mut self.links(parent, false)?)
    }

    /// Store `child` under `parent`; returns the child id.
    pub fn set_child(&self, parent: &P::Id, child: &mut C) -> Result<C::Id, InternalError> {
        let opts = SetOptions::new().with_ext(self.shared.name.clone(), ParentId(parent.clone()));

        self.shared
            .children()?
            .instance(self.txn)
            .set_with(child, &opts)
            .map_err(|err| err.context("failed to set child"))
    }

    // P2C entries of exactly `parent`: key is the parent key, value the child key.
    fn links(
        &self,
        parent: &P::Id,
        reverse: bool,
    ) -> Result<RangeCursor<'a>, InternalError> {
        let key = self.shared.parents()?.encode_id(parent)?;
        let opts = IteratorOptions::prefix(key.clone()).reversed(reverse);

        Ok(self
            .shared
            .p2c
            .instance(self.txn)
            .new_iterator(&opts)
            .filter(move |c| Ok(c.key()? == key))
            .boxed())
    }
}

impl<P: Record, C: Record> fmt::Debug for AssociationInstance<'_, P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationInstance")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}
