//! The error type shared by the closure engine, scheduler, and resolver.

use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by OntoWeft operations.
///
/// Every variant is a distinct, matchable kind so that callers (the HTTP
/// layer in particular) can translate them into protocol-appropriate
/// responses without string inspection.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// A transaction could not be started or committed.
    #[error("graph store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store failed while a category's traversal was in progress.
    #[error("traversal failed for category {category:?}: {message}")]
    TraversalFailure { category: String, message: String },

    /// The prefix is absent from the curie registry.
    #[error("unknown curie prefix {0:?}")]
    UnknownCuriePrefix(String),

    /// The request was rejected before touching the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The per-category time bound elapsed before the traversal finished.
    #[error("category {category:?} did not complete within {after:?}")]
    Timeout { category: String, after: Duration },

    /// The traversal observed a cancellation request and stopped early.
    #[error("category {category:?} was cancelled")]
    Cancelled { category: String },
}

impl Error {
    /// Build a [`Error::TraversalFailure`] for `category` from a store error.
    pub fn traversal(category: &str, source: StoreError) -> Self {
        Error::TraversalFailure {
            category: category.to_string(),
            message: source.to_string(),
        }
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::StoreUnavailable(_) => "store_unavailable",
            Error::TraversalFailure { .. } => "traversal_failure",
            Error::UnknownCuriePrefix(_) => "unknown_curie_prefix",
            Error::InvalidInput(_) => "invalid_parameter",
            Error::Timeout { .. } => "timeout",
            Error::Cancelled { .. } => "cancelled",
        }
    }
}

/// Store errors outside a traversal (entity lookup, root resolution) mean the
/// store could not serve the request at all.
impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::StoreUnavailable(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
