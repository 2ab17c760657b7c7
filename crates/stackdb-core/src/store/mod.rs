//! Module: store
//! Responsibility: key-prefixing composition over a transaction and typed
//! (codec-backed) access on top of it.
//! Does not own: key encoding of record ids or extension layout.
//!
//! Invariants:
//! - `PrefixStore::new(a).prefixed(b).key_of(k) == a ∥ b ∥ k`.
//! - Cursors handed out by a prefix instance report keys with the
//!   accumulated prefix trimmed.
//! - Prefix bytes are immutable once a store is built; instances share them.

mod prefix;
mod serialized;


pub use prefix::{PrefixCursor, PrefixInstance, PrefixStore};
pub use serialized::{SerializedCursor, SerializedInstance, SerializedStore};
