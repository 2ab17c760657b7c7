use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable classification.
/// Every fallible operation in the crate returns this type; module-local error
/// enums convert into it and pick the class on the way.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a not-found error for a specific origin.
    pub fn not_found(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, origin, message)
    }

    /// Construct an invalid-argument error for a specific origin.
    pub fn invalid_argument(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidArgument, origin, message)
    }

    /// Construct an integrity error for a specific origin.
    pub fn integrity(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Integrity, origin, message)
    }

    /// Construct a codec error for a specific origin.
    pub fn codec(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Codec, origin, message)
    }

    pub(crate) fn full(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Full, origin, message)
    }

    pub(crate) fn conflict(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, origin, message)
    }

    pub(crate) fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    pub(crate) fn internal(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, origin, message)
    }

    /// Prefix the message with caller context, keeping class and origin.
    #[must_use]
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_class(&self, class: ErrorClass) -> bool {
        self.class as u8 == class as u8
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    NotFound,
    InvalidArgument,
    Integrity,
    Codec,
    Full,
    Conflict,
    Unsupported,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::Integrity => "integrity",
            Self::Codec => "codec",
            Self::Full => "full",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Origin taxonomy: the layer that raised the error.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Kv,
    Lex,
    Cursor,
    Store,
    Registry,
    Ref,
    Range,
    Index,
    Extension,
    Record,
    Relation,
    Serialize,
    Query,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Kv => "kv",
            Self::Lex => "lex",
            Self::Cursor => "cursor",
            Self::Store => "store",
            Self::Registry => "registry",
            Self::Ref => "ref",
            Self::Range => "range",
            Self::Index => "index",
            Self::Extension => "extension",
            Self::Record => "record",
            Self::Relation => "relation",
            Self::Serialize => "serialize",
            Self::Query => "query",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
