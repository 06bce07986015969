//! Error types for the query crate.

use indexer::{Generation, IndexError, UnknownAttribute};
use record_store::StoreError;
use thiserror::Error;

/// Errors a query can surface.
///
/// An `Ok` with an empty result always means "no matching records"; anything
/// that prevented checking is one of these.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The query named an index or field outside the managed set
    #[error(transparent)]
    UnknownAttribute(#[from] UnknownAttribute),

    /// No index generation has been published yet
    #[error("No index generation has been published; run a rebuild first")]
    IndexNotBuilt,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The generation a query pinned was collected before the query finished;
    /// whatever it read may be partial. Retrying resolves a fresh snapshot.
    #[error("Index generation {0} was collected while the query ran; retry the query")]
    SnapshotExpired(Generation),

    /// The record store failed or timed out
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The index metadata could not be read
    #[error("Index error: {0}")]
    Index(IndexError),
}

impl From<IndexError> for QueryError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Store(e) => QueryError::Store(e),
            other => QueryError::Index(other),
        }
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, QueryError>;
