//! Core of StackDB: a stack of stores over an ordered transactional
//! key-value engine. Each layer wraps the one below it; records, indexes and
//! relations are all ordinary keys under disjoint prefixes.
#![warn(unreachable_pub)]

extern crate self as stackdb;

// public exports are one module level down
pub mod config;
pub mod cursor;
pub mod error;
pub mod ext;
pub mod index;
pub mod kv;
pub mod lex;
pub mod query;
pub mod range;
pub mod record;
pub mod reference;
pub mod registry;
pub mod relation;
pub mod serialize;
pub mod store;
pub mod value;

///
/// Prelude
///
/// Traits and types needed to define records and work with a store inside a
/// transaction. Cursor adapters, codecs and ref-level types stay in their
/// modules.
///

pub mod prelude {
    pub use crate::{
        cursor::{Cursor, CursorExt},
        error::InternalError,
        ext::SetOptions,
        index::{Index, PathBound},
        kv::{Database, DatabaseExt, IteratorOptions, MemoryDb, Transaction},
        record::{Record, RecordId, RecordStore},
        relation::{Association, Children, ParentId, Relation, RelationKey},
        store::PrefixStore,
        value::{Document, FieldValue, FieldValues, Value},
    };
}
