//! Error types for the indexer crate.

use record_store::StoreError;
use thiserror::Error;

/// Errors that can occur while loading records or rebuilding indexes
#[derive(Error, Debug)]
pub enum IndexError {
    /// The record store failed; fatal to a rebuild
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Another rebuild holds the index namespaces
    #[error("A rebuild is already in progress")]
    RebuildInProgress,

    /// A single record's payload could not be parsed.
    ///
    /// The builder counts and skips these; they never abort a rebuild.
    #[error("Malformed record {key}: {reason}")]
    MalformedRecord { key: String, reason: String },

    /// The published generation pointer holds something other than a number
    #[error("Corrupt generation pointer: {0}")]
    CorruptPointer(String),

    /// I/O error occurred while reading an input file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An attribute name outside the managed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} attribute: {name}")]
pub struct UnknownAttribute {
    pub kind: &'static str,
    pub name: String,
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, IndexError>;
