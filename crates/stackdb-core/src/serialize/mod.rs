use crate::{
    config::DEFAULT_MAX_VALUE_BYTES,
    error::{ErrorOrigin, InternalError},
};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    fmt,
    marker::PhantomData,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use thiserror::Error as ThisError;

/// Generic CBOR serialization infrastructure plus the pluggable record codec.
///
/// - Format helpers (`serialize`, `deserialize`) know nothing about stores.
/// - Stores hold an `Arc<dyn Codec<T>>`; `CborCodec` is the default and
///   `FnCodec` adapts a caller-supplied marshal/unmarshal pair.

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),

    #[error("deserialize size limit exceeded: {len} bytes (limit {max_bytes})")]
    DeserializeSizeLimitExceeded { len: usize, max_bytes: usize },
}

impl From<SerializeError> for InternalError {
    fn from(err: SerializeError) -> Self {
        Self::codec(ErrorOrigin::Serialize, err.to_string())
    }
}

/// Serialize a value with the default CBOR encoding.
pub fn serialize<T>(value: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    CborCodec::encode(value)
}

/// Deserialize a value produced by [`serialize`] under the default size bound.
pub fn deserialize<T>(bytes: &[u8]) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    CborCodec::new().decode(bytes)
}

/// Deserialize a value produced by [`serialize`], with an explicit size limit.
///
/// Size limits are caller policy, not serialization-format policy.
pub fn deserialize_bounded<T>(bytes: &[u8], max_bytes: usize) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    CborCodec::with_max_bytes(max_bytes).decode(bytes)
}

///
/// Codec
///
/// Marshal/unmarshal pair for one record type.
///

pub trait Codec<T>: Send + Sync {
    fn marshal(&self, value: &T) -> Result<Vec<u8>, InternalError>;

    fn unmarshal(&self, bytes: &[u8]) -> Result<T, InternalError>;
}

///
/// CborCodec
///
/// Default record codec. Decoding rejects payloads above `max_bytes` before
/// parsing, and a panic inside the CBOR decoder comes back as a
/// `Deserialize` error.
///

#[derive(Clone, Copy, Debug)]
pub struct CborCodec {
    max_bytes: usize,
}

impl CborCodec {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_VALUE_BYTES,
        }
    }

    #[must_use]
    pub const fn with_max_bytes(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn encode<T>(value: &T) -> Result<Vec<u8>, SerializeError>
    where
        T: Serialize,
    {
        serde_cbor::to_vec(value).map_err(|err| SerializeError::Serialize(err.to_string()))
    }

    pub fn decode<T>(&self, bytes: &[u8]) -> Result<T, SerializeError>
    where
        T: DeserializeOwned,
    {
        if bytes.len() > self.max_bytes {
            return Err(SerializeError::DeserializeSizeLimitExceeded {
                len: bytes.len(),
                max_bytes: self.max_bytes,
            });
        }

        match catch_unwind(AssertUnwindSafe(|| serde_cbor::from_slice(bytes))) {
            Ok(decoded) => decoded.map_err(|err| SerializeError::Deserialize(err.to_string())),
            Err(_) => Err(SerializeError::Deserialize(
                "decoder panicked on malformed CBOR".into(),
            )),
        }
    }

    /// Shared handle for the default codec of `T`.
    #[must_use]
    pub fn shared<T>() -> Arc<dyn Codec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        Arc::new(Self::new())
    }
}

impl Default for CborCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec<T> for CborCodec
where
    T: Serialize + DeserializeOwned,
{
    fn marshal(&self, value: &T) -> Result<Vec<u8>, InternalError> {
        Ok(Self::encode(value)?)
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<T, InternalError> {
        Ok(self.decode(bytes)?)
    }
}

///
/// FnCodec
///
/// Codec built from a caller-supplied marshal/unmarshal pair.
///

pub struct FnCodec<T, M, U> {
    marshal: M,
    unmarshal: U,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T, M, U> FnCodec<T, M, U>
where
    M: Fn(&T) -> Result<Vec<u8>, InternalError> + Send + Sync,
    U: Fn(&[u8]) -> Result<T, InternalError> + Send + Sync,
{
    pub const fn new(marshal: M, unmarshal: U) -> Self {
        Self {
            marshal,
            unmarshal,
            _marker: PhantomData,
        }
    }
}

impl<T, M, U> Codec<T> for FnCodec<T, M, U>
where
    M: Fn(&T) -> Result<Vec<u8>, InternalError> + Send + Sync,
    U: Fn(&[u8]) -> Result<T, InternalError> + Send + Sync,
{
    fn marshal(&self, value: &T) -> Result<Vec<u8>, InternalError> {
        (self.marshal)(value)
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<T, InternalError> {
        (self.unmarshal)(bytes)
    }
}

impl<T, M, U> fmt::Debug for FnCodec<T, M, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCodec")
    }
}

///
/// TESTS
///
