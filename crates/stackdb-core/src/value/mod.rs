//! Module: value
//! Responsibility: dynamic scalar/list values read out of records by field
//! path, for indexers and the predicate engine.
//! Does not own: ordered byte encoding (see `lex`).

mod document;


use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::{cmp::Ordering, collections::BTreeMap};
use ulid::Ulid;

pub use document::Document;

///
/// Value
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    Ulid(Ulid),
    List(Vec<Self>),
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Uint(_) => ValueKind::Uint,
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::Text(_) => ValueKind::Text,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Ulid(_) => ValueKind::Ulid,
            Self::List(_) => ValueKind::List,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        self.kind().is_numeric()
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Split list values into their elements; scalars yield themselves.
    #[must_use]
    pub fn elements(&self) -> Vec<&Self> {
        match self {
            Self::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Convert a numeric value into another numeric kind.
    ///
    /// Returns `None` when the value is not numeric, the target is not
    /// numeric, or the conversion would lose the integral part.
    #[must_use]
    #[expect(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn coerce(&self, target: ValueKind) -> Option<Self> {
        if self.kind() == target {
            return Some(self.clone());
        }

        match (self, target) {
            (Self::Int(v), ValueKind::Uint) => u64::try_from(*v).ok().map(Self::Uint),
            (Self::Int(v), ValueKind::Float64) => Some(Self::Float64(*v as f64)),
            (Self::Int(v), ValueKind::Float32) => Some(Self::Float32(*v as f32)),
            (Self::Uint(v), ValueKind::Int) => i64::try_from(*v).ok().map(Self::Int),
            (Self::Uint(v), ValueKind::Float64) => Some(Self::Float64(*v as f64)),
            (Self::Uint(v), ValueKind::Float32) => Some(Self::Float32(*v as f32)),
            (Self::Float32(v), ValueKind::Float64) => Some(Self::Float64(f64::from(*v))),
            (Self::Float64(v), ValueKind::Float32) => Some(Self::Float32(*v as f32)),
            (Self::Float32(v), ValueKind::Int) => float_to_i64(f64::from(*v)).map(Self::Int),
            (Self::Float64(v), ValueKind::Int) => float_to_i64(*v).map(Self::Int),
            (Self::Float32(v), ValueKind::Uint) => float_to_u64(f64::from(*v)).map(Self::Uint),
            (Self::Float64(v), ValueKind::Uint) => float_to_u64(*v).map(Self::Uint),
            _ => None,
        }
    }

    /// Compare two values, crossing numeric kinds.
    ///
    /// Returns `None` for incomparable kinds and for NaN.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Uint(a), Self::Uint(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Uint(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Self::Uint(a), Self::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Bytes(a), Self::Bytes(b)) => Some(a.cmp(b)),
            (Self::Ulid(a), Self::Ulid(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (Self::Float64(x), Self::Float64(y)) =
                    (a.coerce(ValueKind::Float64)?, b.coerce(ValueKind::Float64)?)
                else {
                    return None;
                };
                x.partial_cmp(&y)
            }
            _ => None,
        }
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_i64(v: f64) -> Option<i64> {
    (v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64)
        .then_some(v as i64)
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn float_to_u64(v: f64) -> Option<u64> {
    (v.is_finite() && v.fract() == 0.0 && v >= 0.0 && v < u64::MAX as f64).then_some(v as u64)
}

///
/// ValueKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Uint,
    Float32,
    Float64,
    Text,
    Bytes,
    Ulid,
    List,
}

impl ValueKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Ulid => "ulid",
            Self::List => "list",
        }
    }

    /// One-byte discriminator used by typed index components.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Null => 0x00,
            Self::Bool => 0x01,
            Self::Int => 0x02,
            Self::Uint => 0x03,
            Self::Float32 => 0x04,
            Self::Float64 => 0x05,
            Self::Text => 0x06,
            Self::Bytes => 0x07,
            Self::Ulid => 0x08,
            Self::List => 0x09,
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Uint | Self::Float32 | Self::Float64)
    }

    /// Encoded width when the kind is fixed-size.
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Bool => Some(1),
            Self::Int | Self::Uint | Self::Float64 => Some(8),
            Self::Float32 => Some(4),
            Self::Ulid => Some(16),
            Self::Null | Self::Text | Self::Bytes | Self::List => None,
        }
    }
}

///
/// FieldValue
///
/// Conversion of one field into a dynamic `Value`.
///

pub trait FieldValue {
    fn to_value(&self) -> Value;
}

///
/// FieldValues
///
/// Path-addressed access to a record's fields. Paths are dotted
/// (`"address.city"`); `#[derive(FieldValues)]` generates the impl.
///

pub trait FieldValues {
    fn get_value(&self, path: &str) -> Option<Value>;

    /// Fields marked for the tag indexer.
    #[must_use]
    fn indexed_fields() -> &'static [&'static str]
    where
        Self: Sized,
    {
        &[]
    }
}

macro_rules! impl_field_value {
    ($variant:ident, $target:ty => $($t:ty),* $(,)?) => {
        $(
            impl FieldValue for $t {
                fn to_value(&self) -> Value {
                    Value::$variant(<$target>::from(*self))
                }
            }
        )*
    };
}

impl_field_value!(Int, i64 => i8, i16, i32, i64);
impl_field_value!(Uint, u64 => u8, u16, u32, u64);
impl_field_value!(Bool, bool => bool);
impl_field_value!(Float32, f32 => f32);
impl_field_value!(Float64, f64 => f64);

impl FieldValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FieldValue for &str {
    fn to_value(&self) -> Value {
        Value::Text((*self).to_string())
    }
}

impl FieldValue for ByteBuf {
    fn to_value(&self) -> Value {
        Value::Bytes(self.to_vec())
    }
}

impl FieldValue for Ulid {
    fn to_value(&self) -> Value {
        Value::Ulid(*self)
    }
}

impl FieldValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl FieldValues for BTreeMap<String, Value> {
    fn get_value(&self, path: &str) -> Option<Value> {
        self.get(path).cloned()
    }
}
