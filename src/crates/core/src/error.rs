//! Error type shared by construction, feeding and value extraction.

use crate::value::Value;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The tree specification cannot be assembled. Raised by `build()` only.
    Construction(String),
    /// A record lacks a field a callback asked for.
    MissingField(String),
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    Overflow,
    /// Failure reported by a user callback (fold, filter, grouping, sort key).
    Callback(String),
    /// A computed field read a sibling that is absent or not resolved yet.
    Unresolved(String),
    /// Direct bucket lookup for a key that was never fed.
    UnknownGroup(Value),
}

impl Error {
    pub fn construction(msg: impl Into<String>) -> Self {
        Error::Construction(msg.into())
    }

    pub fn callback(msg: impl std::fmt::Display) -> Self {
        Error::Callback(msg.to_string())
    }

    pub fn mismatch(expected: &'static str, found: &Value) -> Self {
        Error::TypeMismatch {
            expected,
            found: found.type_name(),
        }
    }

    /// Construction errors make the tree unusable; every other kind is tied to
    /// one record or one extraction.
    pub fn is_construction(&self) -> bool {
        matches!(self, Error::Construction(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Construction(msg) => write!(f, "invalid tree specification: {}", msg),
            Error::MissingField(name) => write!(f, "record has no field `{}`", name),
            Error::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            Error::Overflow => write!(f, "integer overflow"),
            Error::Callback(msg) => write!(f, "callback failed: {}", msg),
            Error::Unresolved(name) => write!(f, "field `{}` is not resolved", name),
            Error::UnknownGroup(key) => write!(f, "no group for key {}", key),
        }
    }
}

impl std::error::Error for Error {}
