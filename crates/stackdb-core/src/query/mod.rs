//! Module: query
//! Responsibility: record predicates for post-scan filtering. A source
//! string compiles through an `ExprEngine` into a `Matcher` that is evaluated
//! against each record's field values.
//! Does not own: scan planning (see `index`/`range`) or record iteration.
//!
//! Invariants:
//! - Missing fields evaluate as `Null`.
//! - A comparison against a list field holds when it holds for any element.
//! - Values of incomparable kinds compare unequal and unordered.

mod parse;


use crate::{
    error::{ErrorOrigin, InternalError},
    value::{FieldValues, Value},
};
use std::cmp::Ordering;
use thiserror::Error as ThisError;

///
/// QueryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryError {
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { pos: usize, ch: char },

    #[error("unterminated string starting at {pos}")]
    UnterminatedString { pos: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("expected {expected} at {pos}, found {found}")]
    Unexpected {
        pos: usize,
        expected: &'static str,
        found: String,
    },

    #[error("empty predicate")]
    Empty,
}

impl From<QueryError> for InternalError {
    fn from(err: QueryError) -> Self {
        Self::invalid_argument(ErrorOrigin::Query, err.to_string())
    }
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }

    fn holds(self, ordering: Option<Ordering>) -> bool {
        match self {
            Self::Eq => ordering == Some(Ordering::Equal),
            Self::Ne => ordering != Some(Ordering::Equal),
            Self::Lt => ordering == Some(Ordering::Less),
            Self::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Self::Gt => ordering == Some(Ordering::Greater),
            Self::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

///
/// Predicate
///

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare {
        path: String,
        op: CompareOp,
        value: Value,
    },
}

impl Predicate {
    #[must_use]
    pub fn compare(path: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Self::Compare {
            path: path.into(),
            op,
            value,
        }
    }

    /// Parse the built-in `path op literal` syntax.
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        parse::parse(source)
    }

    #[must_use]
    pub fn eval(&self, record: &dyn FieldValues) -> bool {
        match self {
            Self::And(all) => all.iter().all(|p| p.eval(record)),
            Self::Or(any) => any.iter().any(|p| p.eval(record)),
            Self::Not(inner) => !inner.eval(record),
            Self::Compare { path, op, value } => {
                let field = record.get_value(path).unwrap_or(Value::Null);
                field
                    .elements()
                    .into_iter()
                    .any(|element| op.holds(element.compare(value)))
            }
        }
    }
}

///
/// Matcher
///
/// A compiled predicate.
///

pub trait Matcher: Send + Sync {
    fn matches(&self, record: &dyn FieldValues) -> Result<bool, InternalError>;
}

impl Matcher for Predicate {
    fn matches(&self, record: &dyn FieldValues) -> Result<bool, InternalError> {
        Ok(self.eval(record))
    }
}

///
/// ExprEngine
///
/// Compiles predicate source into a matcher. Record stores use
/// [`FieldExprEngine`] unless another engine is supplied.
///

pub trait ExprEngine: Send + Sync {
    fn compile(&self, source: &str) -> Result<Box<dyn Matcher>, InternalError>;
}

///
/// FieldExprEngine
///
/// Terms `path op literal` joined by `&&` and `||`, negated with `!` and
/// grouped with parentheses. Literals are quoted strings, numbers, `true`,
/// `false` and `null`.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct FieldExprEngine;

impl ExprEngine for FieldExprEngine {
    fn compile(&self, source: &str) -> Result<Box<dyn Matcher>, InternalError> {
        Ok(Box::new(Predicate::parse(source)?))
    }
}
