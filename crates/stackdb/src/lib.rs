//! ## Crate layout
//! - `core`: the store stack (lex codec, cursors, prefix/ref/serialized
//!   stores, range engine, indexes, extensible and record stores,
//!   relations) plus the engine seam and its in-memory engine.
//! - `derive`: `#[derive(FieldValues)]`.
//!
//! Each core module is re-exported at the top level, so
//! `stackdb::record::RecordStore` and `stackdb::core::record::RecordStore`
//! name the same type. The `prelude` covers record definition and
//! transactional use.

pub use stackdb_core as core;
pub use stackdb_derive as derive;

pub use stackdb_core::{
    config, cursor, error, ext, index, kv, lex, query, range, record, reference, registry,
    relation, serialize, store, value,
};

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use stackdb_core::error::InternalError as Error;
pub use stackdb_derive::FieldValues;

///
/// Prelude
/// The core prelude plus the derive macro and serde's derives.
///

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::derive::FieldValues;
    pub use serde::{Deserialize, Serialize};
}
