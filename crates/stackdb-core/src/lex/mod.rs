//! Module: lex
//! Responsibility: order-preserving byte encodings for scalars and the byte
//! arithmetic (invert/increment/decrement/pad) that index and range code
//! builds on.
//! Does not own: index key framing (see `index`) or range planning.
//!
//! Invariants:
//! - `encode(a) < encode(b)` iff `a < b` for every supported scalar type.
//! - NaN is encoded as all zero bytes and is the only value with that image.
//! - Signed integers flip the sign bit; unsigned integers are big-endian.

mod bytes;
mod scalar;


use crate::{
    error::{ErrorOrigin, InternalError},
    value::{Value, ValueKind},
};
use thiserror::Error as ThisError;

pub use bytes::{decrement, increment, invert, inverted, pad_left, pad_right, resize};

///
/// LexError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum LexError {
    #[error("unsupported type: {kind}")]
    UnsupportedType { kind: &'static str },

    #[error("invalid encoded length: expected {expected} bytes, found {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("invalid utf-8 in encoded text")]
    InvalidUtf8,

    #[error("invalid option marker {0:#04x}")]
    InvalidMarker(u8),
}

impl From<LexError> for InternalError {
    fn from(err: LexError) -> Self {
        Self::codec(ErrorOrigin::Lex, err.to_string())
    }
}

///
/// LexEncode
///

pub trait LexEncode {
    /// Append the order-preserving image of `self` to `out`.
    fn lex_encode(&self, out: &mut Vec<u8>);

    fn to_lex(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.lex_encode(&mut out);
        out
    }
}

///
/// LexDecode
///

pub trait LexDecode: Sized {
    fn lex_decode(bytes: &[u8]) -> Result<Self, LexError>;
}

/// Encode a dynamic value. Lists are rejected; `Null` encodes as no bytes.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, LexError> {
    let mut out = Vec::new();
    encode_value_into(value, &mut out)?;

    Ok(out)
}

/// Append the encoded image of a dynamic value to `out`.
pub fn encode_value_into(value: &Value, out: &mut Vec<u8>) -> Result<(), LexError> {
    match value {
        Value::Null => {}
        Value::Bool(v) => v.lex_encode(out),
        Value::Int(v) => v.lex_encode(out),
        Value::Uint(v) => v.lex_encode(out),
        Value::Float32(v) => v.lex_encode(out),
        Value::Float64(v) => v.lex_encode(out),
        Value::Text(v) => v.lex_encode(out),
        Value::Bytes(v) => out.extend_from_slice(v),
        Value::Ulid(v) => v.lex_encode(out),
        Value::List(_) => {
            return Err(LexError::UnsupportedType {
                kind: ValueKind::List.label(),
            });
        }
    }

    Ok(())
}

/// Decode bytes produced by [`encode_value`] for a known kind.
pub fn decode_value(kind: ValueKind, bytes: &[u8]) -> Result<Value, LexError> {
    let value = match kind {
        ValueKind::Null => {
            if !bytes.is_empty() {
                return Err(LexError::InvalidLength {
                    expected: 0,
                    found: bytes.len(),
                });
            }
            Value::Null
        }
        ValueKind::Bool => Value::Bool(bool::lex_decode(bytes)?),
        ValueKind::Int => Value::Int(i64::lex_decode(bytes)?),
        ValueKind::Uint => Value::Uint(u64::lex_decode(bytes)?),
        ValueKind::Float32 => Value::Float32(f32::lex_decode(bytes)?),
        ValueKind::Float64 => Value::Float64(f64::lex_decode(bytes)?),
        ValueKind::Text => Value::Text(String::lex_decode(bytes)?),
        ValueKind::Bytes => Value::Bytes(bytes.to_vec()),
        ValueKind::Ulid => Value::Ulid(ulid::Ulid::lex_decode(bytes)?),
        ValueKind::List => {
            return Err(LexError::UnsupportedType {
                kind: ValueKind::List.label(),
            });
        }
    };

    Ok(value)
}
