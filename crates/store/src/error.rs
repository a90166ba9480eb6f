use std::error::Error;
use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The store rejected the query, e.g. a syntax error or an unknown
    /// identifier.
    InvalidQuery,
    /// The store could not be reached, or the session is broken.
    Unavailable,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidQuery => write!(f, "Invalid query"),
            ErrorKind::Unavailable => write!(f, "Store unavailable"),
            ErrorKind::Other => write!(f, "Other"),
        }
    }
}

/// The error type for a store.
pub trait StoreError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}
