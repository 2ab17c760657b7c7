//! Module: registry
//! Responsibility: process-wide mapping of long names to short fixed-width
//! byte tags, persisted under the minimum key of the registry prefix.
//! Does not own: what the tagged namespaces contain.
//!
//! Invariants:
//! - Tags are assigned from 1 upward and never reused or collected.
//! - A tag is persisted before it is handed out.
//! - Tags are big-endian and exactly `tag_len` bytes wide.

#[cfg(test)]
mod tests;

use crate::{
    config::{DEFAULT_REGISTRY_TAG_LEN, StackConfig},
    error::{ErrorOrigin, InternalError},
    kv::{Database, DatabaseExt},
    serialize::{deserialize, serialize},
    store::PrefixStore,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, sync::Arc};
use thiserror::Error as ThisError;

///
/// RegistryError
///

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("registry full")]
    Full,

    #[error("registry tag length must be between 1 and 8, got {0}")]
    TagLen(usize),

    #[error("registry prefix must not be empty")]
    EmptyPrefix,
}

impl From<RegistryError> for InternalError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Full => Self::full(ErrorOrigin::Registry, err.to_string()),
            RegistryError::TagLen(_) | RegistryError::EmptyPrefix => {
                Self::invalid_argument(ErrorOrigin::Registry, err.to_string())
            }
        }
    }
}

///
/// RegistryState
/// Persisted form: the mapping plus the next free tag.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct RegistryState {
    names: BTreeMap<String, u64>,
    next: u64,
}

///
/// NameRegistry
///

pub struct NameRegistry {
    db: Arc<dyn Database>,
    store: PrefixStore,
    tag_len: usize,
    state: Mutex<Option<RegistryState>>,
}

impl NameRegistry {
    pub fn new(db: Arc<dyn Database>, prefix: impl AsRef<[u8]>) -> Result<Self, InternalError> {
        Self::with_tag_len(db, prefix, DEFAULT_REGISTRY_TAG_LEN)
    }

    pub fn with_config(
        db: Arc<dyn Database>,
        prefix: impl AsRef<[u8]>,
        config: &StackConfig,
    ) -> Result<Self, InternalError> {
        Self::with_tag_len(db, prefix, config.registry_tag_len)
    }

    pub fn with_tag_len(
        db: Arc<dyn Database>,
        prefix: impl AsRef<[u8]>,
        tag_len: usize,
    ) -> Result<Self, InternalError> {
        if !(1..=8).contains(&tag_len) {
            return Err(RegistryError::TagLen(tag_len).into());
        }
        if prefix.as_ref().is_empty() {
            return Err(RegistryError::EmptyPrefix.into());
        }

        Ok(Self {
            db,
            store: PrefixStore::new(prefix),
            tag_len,
            state: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        self.store.prefix()
    }

    #[must_use]
    pub const fn tag_len(&self) -> usize {
        self.tag_len
    }

    /// Tag of `name`, assigning and persisting the next free tag on first use.
    pub fn name(&self, name: &str) -> Result<Vec<u8>, InternalError> {
        let mut guard = self.state.lock();
        let state = self.loaded(&mut guard)?;

        if let Some(tag) = state.names.get(name) {
            return Ok(self.encode(*tag));
        }

        let tag = state.next.max(1);
        if tag > self.max_tag() {
            return Err(RegistryError::Full.into());
        }

        let mut updated = state.clone();
        updated.names.insert(name.to_string(), tag);
        updated.next = tag + 1;

        let bytes = serialize(&updated)?;
        self.db.update(|txn| self.store.instance(txn).set(b"", &bytes))?;
        *state = updated;

        tracing::debug!(name, tag, prefix = ?self.store.prefix(), "registered name");

        Ok(self.encode(tag))
    }

    /// Existing tag of `name`, without assigning one.
    pub fn tag_of(&self, name: &str) -> Result<Option<Vec<u8>>, InternalError> {
        let mut guard = self.state.lock();
        let state = self.loaded(&mut guard)?;

        Ok(state.names.get(name).map(|tag| self.encode(*tag)))
    }

    /// Snapshot of every registered name and its tag.
    pub fn names(&self) -> Result<BTreeMap<String, Vec<u8>>, InternalError> {
        let mut guard = self.state.lock();
        let state = self.loaded(&mut guard)?;

        Ok(state
            .names
            .iter()
            .map(|(name, tag)| (name.clone(), self.encode(*tag)))
            .collect())
    }

    /// Store rooted at `prefix ∥ tag(name)`.
    pub fn store_prefix(&self, name: &str) -> Result<PrefixStore, InternalError> {
        let tag = self.name(name)?;
        Ok(self.store.prefixed(tag))
    }

    /// Registry nested under the tag of `name`.
    pub fn sub_registry(&self, name: &str) -> Result<Self, InternalError> {
        let store = self.store_prefix(name)?;
        Self::with_tag_len(Arc::clone(&self.db), store.prefix(), self.tag_len)
    }

    fn loaded<'g>(
        &self,
        guard: &'g mut Option<RegistryState>,
    ) -> Result<&'g mut RegistryState, InternalError> {
        if guard.is_none() {
            let stored = self.db.view(|txn| match self.store.instance(txn).get_value(b"") {
                Ok(bytes) => Ok(Some(bytes)),
                Err(err) if err.is_not_found() => Ok(None),
                Err(err) => Err(err),
            })?;

            let state = match stored {
                Some(bytes) => deserialize(&bytes)?,
                None => RegistryState::default(),
            };
            *guard = Some(state);
        }

        guard
            .as_mut()
            .ok_or_else(|| InternalError::internal(ErrorOrigin::Registry, "registry not loaded"))
    }

    const fn max_tag(&self) -> u64 {
        if self.tag_len >= 8 {
            u64::MAX
        } else {
            (1u64 << (self.tag_len * 8)) - 1
        }
    }

    fn encode(&self, tag: u64) -> Vec<u8> {
        tag.to_be_bytes()[8 - self.tag_len..].to_vec()
    }
}

impl fmt::Debug for NameRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameRegistry")
            .field("store", &self.store)
            .field("tag_len", &self.tag_len)
            .finish_non_exhaustive()
    }
}
