use crate::{
    error::{ErrorOrigin, InternalError},
    kv::{Database, Sequence},
    lex::{LexDecode, LexEncode, LexError},
};
use std::{fmt, sync::Arc};
use thiserror::Error as ThisError;
use ulid::Ulid;

///
/// IdentityError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum IdentityError {
    #[error("zero id and no id source")]
    ZeroId,

    #[error("id source value {0} does not fit the id type")]
    Overflow(u64),

    #[error("invalid encoded id: {0}")]
    Decode(#[from] LexError),
}

impl From<IdentityError> for InternalError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::ZeroId => Self::invalid_argument(ErrorOrigin::Record, err.to_string()),
            IdentityError::Overflow(_) => Self::full(ErrorOrigin::Record, err.to_string()),
            IdentityError::Decode(_) => Self::codec(ErrorOrigin::Record, err.to_string()),
        }
    }
}

///
/// RecordId
///
/// An id type with a zero sentinel and a default order-preserving encoding.
///

pub trait RecordId: Clone + fmt::Debug + Send + Sync + 'static {
    /// True for the "unset" value that triggers id assignment.
    fn is_zero(&self) -> bool;

    fn encode_id(&self) -> Vec<u8>;

    fn decode_id(bytes: &[u8]) -> Result<Self, IdentityError>;
}

macro_rules! impl_record_id_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl RecordId for $t {
                fn is_zero(&self) -> bool {
                    *self == 0
                }

                fn encode_id(&self) -> Vec<u8> {
                    self.to_lex()
                }

                fn decode_id(bytes: &[u8]) -> Result<Self, IdentityError> {
                    Ok(Self::lex_decode(bytes)?)
                }
            }
        )*
    };
}

impl_record_id_int!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! impl_record_id_lex {
    ($($t:ty => $zero:expr),* $(,)?) => {
        $(
            impl RecordId for $t {
                fn is_zero(&self) -> bool {
                    let zero: fn(&Self) -> bool = $zero;
                    zero(self)
                }

                fn encode_id(&self) -> Vec<u8> {
                    self.to_lex()
                }

                fn decode_id(bytes: &[u8]) -> Result<Self, IdentityError> {
                    Ok(Self::lex_decode(bytes)?)
                }
            }
        )*
    };
}

impl_record_id_lex!(
    String => String::is_empty,
    Vec<u8> => Vec::is_empty,
    Ulid => Ulid::is_nil,
    [u8; 16] => |id| id.iter().all(|b| *b == 0),
);

///
/// IdCodec
///
/// Order-preserving id encoding used for record keys.
///

pub trait IdCodec<I>: Send + Sync {
    fn encode(&self, id: &I) -> Result<Vec<u8>, InternalError>;

    fn decode(&self, bytes: &[u8]) -> Result<I, InternalError>;
}

///
/// LexIdCodec
/// Default codec: the id type's own lex encoding.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct LexIdCodec;

impl<I: RecordId> IdCodec<I> for LexIdCodec {
    fn encode(&self, id: &I) -> Result<Vec<u8>, InternalError> {
        Ok(id.encode_id())
    }

    fn decode(&self, bytes: &[u8]) -> Result<I, InternalError> {
        Ok(I::decode_id(bytes)?)
    }
}

///
/// IdSource
///
/// Supplies ids for records set with a zero id.
///

pub trait IdSource<I>: Send + Sync {
    fn next_id(&self) -> Result<I, InternalError>;

    /// Release held resources; called by `RecordStore::close`.
    fn close(&self) -> Result<(), InternalError> {
        Ok(())
    }
}

///
/// SequenceIds
///
/// Ids from an engine sequence, shifted by one so zero stays "unset".
///

#[derive(Debug)]
pub struct SequenceIds {
    sequence: Sequence,
}

impl SequenceIds {
    pub fn new(
        db: Arc<dyn Database>,
        key: impl Into<Vec<u8>>,
        bandwidth: u64,
    ) -> Result<Self, InternalError> {
        Ok(Self {
            sequence: Sequence::new(db, key, bandwidth)?,
        })
    }
}

impl<I: TryFrom<u64>> IdSource<I> for SequenceIds {
    fn next_id(&self) -> Result<I, InternalError> {
        let n = self.sequence.next()?;
        let shifted = n.checked_add(1).ok_or(IdentityError::Overflow(n))?;

        Ok(I::try_from(shifted).map_err(|_| IdentityError::Overflow(shifted))?)
    }

    fn close(&self) -> Result<(), InternalError> {
        self.sequence.release()
    }
}

///
/// FnIds
/// Ids from a caller closure.
///

pub struct FnIds<F>(pub F);

impl<I, F> IdSource<I> for FnIds<F>
where
    F: Fn() -> Result<I, InternalError> + Send + Sync,
{
    fn next_id(&self) -> Result<I, InternalError> {
        (self.0)()
    }
}

impl<F> fmt::Debug for FnIds<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnIds")
    }
}
