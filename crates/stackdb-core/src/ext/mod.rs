//! Module: ext
//! Responsibility: the extensible object store. Records live under `d`;
//! every named extension owns a sub-store under `x ∥ name` and is notified
//! of each set and delete inside the writing transaction.
//! Does not own: what extensions write (see `index`, `relation`).
//!
//! Invariants:
//! - Extensions run in registration order.
//! - `on_set` sees the previously stored value (if any) and the new one;
//!   `on_delete` runs before the physical delete and sees the stored value.
//! - The first extension error aborts the operation; writes already made
//!   stay in the transaction, which the caller must discard.

mod migrate;
mod options;


use crate::{
    cursor::Cursor,
    error::{ErrorOrigin, InternalError},
    kv::{IteratorOptions, Transaction},
    registry::NameRegistry,
    serialize::Codec,
    store::{PrefixInstance, PrefixStore, SerializedCursor, SerializedInstance, SerializedStore},
};
use parking_lot::RwLock;
use std::{
    fmt,
    sync::{Arc, Weak},
};

pub use migrate::migrate;
pub use options::{Initializing, SetOptions};

/// Sub-prefix holding record data.
pub const DATA_PREFIX: &[u8] = b"d";

/// Sub-prefix holding every extension sub-store.
pub const EXT_PREFIX: &[u8] = b"x";

const RESERVED_NAMES: [&str; 2] = ["d", "x"];

///
/// Extension
///
/// A named write-pipeline step attached to an extensible store.
///

pub trait Extension<T>: Send + Sync {
    fn on_set(
        &self,
        ctx: &ExtContext<'_>,
        key: &[u8],
        old: Option<&T>,
        new: &T,
        opts: &SetOptions,
    ) -> Result<(), InternalError>;

    fn on_delete(&self, ctx: &ExtContext<'_>, key: &[u8], value: &T) -> Result<(), InternalError>;
}

///
/// ExtContext
///
/// What an extension callback may touch: the transaction and its own
/// sub-store.
///

pub struct ExtContext<'a> {
    txn: &'a dyn Transaction,
    name: &'a str,
    store: &'a PrefixStore,
}

impl<'a> ExtContext<'a> {
    #[must_use]
    pub fn txn(&self) -> &'a dyn Transaction {
        self.txn
    }

    #[must_use]
    pub const fn name(&self) -> &'a str {
        self.name
    }

    #[must_use]
    pub const fn store(&self) -> &'a PrefixStore {
        self.store
    }

    #[must_use]
    pub fn instance(&self) -> PrefixInstance<'a> {
        self.store.instance(self.txn)
    }
}

impl fmt::Debug for ExtContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtContext")
            .field("name", &self.name)
            .field("store", self.store)
            .finish_non_exhaustive()
    }
}

struct Registered<T> {
    name: String,
    store: PrefixStore,
    ext: Arc<dyn Extension<T>>,
}

impl<T> Registered<T> {
    fn context<'a>(&'a self, txn: &'a dyn Transaction) -> ExtContext<'a> {
        ExtContext {
            txn,
            name: &self.name,
            store: &self.store,
        }
    }

    fn wrap(&self, err: InternalError) -> InternalError {
        err.context(format!("extension '{}'", self.name))
    }
}

impl<T> Clone for Registered<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store: self.store.clone(),
            ext: Arc::clone(&self.ext),
        }
    }
}

struct Shared<T> {
    root: PrefixStore,
    data: SerializedStore<T>,
    ext_root: PrefixStore,
    registry: Option<Arc<NameRegistry>>,
    extensions: RwLock<Vec<Registered<T>>>,
}

///
/// ExtStore
///
/// Store description. Clones share the extension list, so an extension
/// registered through one handle is seen by all.
///

pub struct ExtStore<T> {
    shared: Arc<Shared<T>>,
}

impl<T: 'static> ExtStore<T> {
    /// Store whose extension sub-prefixes are length-prefixed names.
    #[must_use]
    pub fn new(root: PrefixStore, codec: Arc<dyn Codec<T>>) -> Self {
        Self::build(root, codec, None)
    }

    /// Store whose extension sub-prefixes are registry tags.
    #[must_use]
    pub fn with_registry(
        root: PrefixStore,
        codec: Arc<dyn Codec<T>>,
        registry: Arc<NameRegistry>,
    ) -> Self {
        Self::build(root, codec, Some(registry))
    }

    fn build(
        root: PrefixStore,
        codec: Arc<dyn Codec<T>>,
        registry: Option<Arc<NameRegistry>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                data: SerializedStore::new(root.prefixed(DATA_PREFIX), codec),
                ext_root: root.prefixed(EXT_PREFIX),
                root,
                registry,
                extensions: RwLock::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn root(&self) -> &PrefixStore {
        &self.shared.root
    }

    #[must_use]
    pub fn data(&self) -> &SerializedStore<T> {
        &self.shared.data
    }

    #[must_use]
    pub fn codec(&self) -> &Arc<dyn Codec<T>> {
        self.shared.data.codec()
    }

    #[must_use]
    pub fn registry(&self) -> Option<&Arc<NameRegistry>> {
        self.shared.registry.as_ref()
    }

    /// Registered extension names in dispatch order.
    #[must_use]
    pub fn extension_names(&self) -> Vec<String> {
        self.shared
            .extensions
            .read()
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    #[must_use]
    pub fn has_extension(&self, name: &str) -> bool {
        self.shared.extensions.read().iter().any(|r| r.name == name)
    }

    /// Sub-store owned by the extension `name`, registered or not.
    pub fn extension_store(&self, name: &str) -> Result<PrefixStore, InternalError> {
        if name.is_empty() || RESERVED_NAMES.contains(&name) {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Extension,
                format!("invalid extension name '{name}'"),
            ));
        }

        let fragment = match &self.shared.registry {
            Some(registry) => registry.name(name)?,
            None => {
                let len = u8::try_from(name.len()).map_err(|_| {
                    InternalError::invalid_argument(
                        ErrorOrigin::Extension,
                        format!("extension name '{name}' exceeds 255 bytes"),
                    )
                })?;
                let mut fragment = vec![len];
                fragment.extend_from_slice(name.as_bytes());
                fragment
            }
        };

        Ok(self.shared.ext_root.prefixed(fragment))
    }

    /// Register without backfill; for extensions installed before the store
    /// holds data.
    pub fn register(
        &self,
        name: impl Into<String>,
        ext: Arc<dyn Extension<T>>,
    ) -> Result<(), InternalError> {
        let registered = self.prepare(name.into(), ext)?;
        self.push(registered)
    }

    #[must_use]
    pub fn instance<'a>(&self, txn: &'a dyn Transaction) -> ExtInstance<'a, T> {
        ExtInstance {
            store: self.clone(),
            txn,
            data: self.shared.data.instance(txn),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakExtStore<T> {
        WeakExtStore {
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn prepare(
        &self,
        name: String,
        ext: Arc<dyn Extension<T>>,
    ) -> Result<Registered<T>, InternalError> {
        if self.has_extension(&name) {
            return Err(duplicate(&name));
        }
        let store = self.extension_store(&name)?;

        Ok(Registered { name, store, ext })
    }

    fn push(&self, registered: Registered<T>) -> Result<(), InternalError> {
        let mut extensions = self.shared.extensions.write();
        if extensions.iter().any(|r| r.name == registered.name) {
            return Err(duplicate(&registered.name));
        }

        tracing::debug!(extension = %registered.name, "registered extension");
        extensions.push(registered);

        Ok(())
    }

    fn forget(&self, name: &str) {
        self.shared.extensions.write().retain(|r| r.name != name);
    }

    fn extensions(&self) -> Vec<Registered<T>> {
        self.shared.extensions.read().clone()
    }
}

fn duplicate(name: &str) -> InternalError {
    InternalError::invalid_argument(
        ErrorOrigin::Extension,
        format!("duplicate extension name '{name}'"),
    )
}

impl<T> Clone for ExtStore<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for ExtStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .shared
            .extensions
            .read()
            .iter()
            .map(|r| r.name.clone())
            .collect();

        f.debug_struct("ExtStore")
            .field("root", &self.shared.root)
            .field("extensions", &names)
            .finish_non_exhaustive()
    }
}

///
/// WeakExtStore
///
/// Non-owning handle, held by extensions that need their peer stores.
///

pub struct WeakExtStore<T> {
    shared: Weak<Shared<T>>,
}

impl<T> WeakExtStore<T> {
    #[must_use]
    pub fn upgrade(&self) -> Option<ExtStore<T>> {
        self.shared.upgrade().map(|shared| ExtStore { shared })
    }
}

impl<T> Clone for WeakExtStore<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for WeakExtStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakExtStore")
    }
}

///
/// ExtInstance
///

pub struct ExtInstance<'a, T> {
    store: ExtStore<T>,
    txn: &'a dyn Transaction,
    data: SerializedInstance<'a, T>,
}

impl<'a, T: 'static> ExtInstance<'a, T> {
    #[must_use]
    pub const fn store(&self) -> &ExtStore<T> {
        &self.store
    }

    #[must_use]
    pub fn txn(&self) -> &'a dyn Transaction {
        self.txn
    }

    /// Direct access to the data sub-store; bypasses extensions.
    #[must_use]
    pub const fn data(&self) -> &SerializedInstance<'a, T> {
        &self.data
    }

    pub fn get(&self, key: &[u8]) -> Result<T, InternalError> {
        self.data.get(key)
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool, InternalError> {
        self.data.exists(key)
    }

    pub fn set(&self, key: &[u8], value: &T) -> Result<(), InternalError> {
        self.set_with(key, value, &SetOptions::new())
    }

    pub fn set_with(&self, key: &[u8], value: &T, opts: &SetOptions) -> Result<(), InternalError> {
        let old = match self.data.get(key) {
            Ok(old) => Some(old),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };
        self.data.set(key, value)?;

        for registered in self.store.extensions() {
            tracing::trace!(extension = %registered.name, "dispatch set");
            registered
                .ext
                .on_set(
                    &registered.context(self.txn),
                    key,
                    old.as_ref(),
                    value,
                    &opts.filtered(&registered.name),
                )
                .map_err(|err| registered.wrap(err))?;
        }

        Ok(())
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), InternalError> {
        let value = self.data.get(key)?;

        for registered in self.store.extensions() {
            tracing::trace!(extension = %registered.name, "dispatch delete");
            registered
                .ext
                .on_delete(&registered.context(self.txn), key, &value)
                .map_err(|err| registered.wrap(err))?;
        }

        self.data.delete(key)
    }

    #[must_use]
    pub fn new_iterator(&self, opts: &IteratorOptions) -> SerializedCursor<'a, T> {
        self.data.new_iterator(opts)
    }

    /// Register `ext` and backfill it with every stored record; returns the
    /// number of records replayed. Backfill calls carry [`Initializing`].
    pub fn add_extension(
        &self,
        name: impl Into<String>,
        ext: Arc<dyn Extension<T>>,
    ) -> Result<usize, InternalError> {
        let registered = self.store.prepare(name.into(), ext)?;
        let ctx = registered.context(self.txn);
        let opts = SetOptions::initializing();

        let mut cursor = self.data.new_iterator(&IteratorOptions::default());
        let mut replayed = 0;
        cursor.rewind();
        while cursor.valid() {
            let key = cursor.key()?;
            let value = cursor.value()?;
            registered
                .ext
                .on_set(&ctx, &key, None, &value, &opts)
                .map_err(|err| registered.wrap(err))?;

            replayed += 1;
            cursor.next();
        }
        cursor.status()?;
        cursor.close();

        tracing::debug!(extension = %registered.name, replayed, "backfilled extension");
        self.store.push(registered)?;

        Ok(replayed)
    }

    /// Purge every key of the extension `name` and forget its registration;
    /// returns the number of keys removed.
    pub fn drop_extension(&self, name: &str) -> Result<usize, InternalError> {
        let purged = self
            .store
            .extension_store(name)?
            .instance(self.txn)
            .delete_prefix(&[])?;
        self.store.forget(name);

        tracing::debug!(extension = %name, purged, "dropped extension");

        Ok(purged)
    }

    /// Purge the whole extension space and forget every registration.
    pub fn drop_all_extensions(&self) -> Result<usize, InternalError> {
        let purged = self
            .store
            .shared
            .ext_root
            .instance(self.txn)
            .delete_prefix(&[])?;
        self.store.shared.extensions.write().clear();

        tracing::debug!(purged, "dropped all extensions");

        Ok(purged)
    }
}

impl<T> fmt::Debug for ExtInstance<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtInstance")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
