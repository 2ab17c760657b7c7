//! Module: relation
//! Responsibility: links between record stores, each realized as a pair of
//! extensions (one per side) observing one shared state.
//! Does not own: record storage or the extension pipeline.
//!
//! Invariants:
//! - Shared state holds weak store handles; a dropped store turns every
//!   link operation into an `Internal` error instead of keeping it alive.
//! - Deleting an endpoint removes every ref entry that names it.

mod association;
mod many;

#[cfg(test)]
mod tests;

use crate::{
    cursor::collect_pairs,
    error::{ErrorOrigin, InternalError},
    kv::IteratorOptions,
    reference::RefInstance,
};

pub use association::{Association, AssociationBuilder, AssociationInstance, Children, ParentId};
pub use many::{Relation, RelationCursor, RelationInstance, RelationKey};

/// Key parts of every entry whose prefix part is exactly `prefix`.
fn peers(refs: &RefInstance<'_>, prefix: &[u8]) -> Result<Vec<Vec<u8>>, InternalError> {
    let pairs = collect_pairs(&mut refs.new_iterator(&IteratorOptions::prefix(prefix)))?;

    Ok(pairs
        .into_iter()
        .filter(|(p, _)| p == prefix)
        .map(|(_, key)| key)
        .collect())
}

fn store_dropped(kind: &str, name: &str) -> InternalError {
    InternalError::internal(
        ErrorOrigin::Relation,
        format!("{kind} '{name}': store handle dropped"),
    )
}
