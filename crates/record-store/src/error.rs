//! Error types for the record-store crate.

use thiserror::Error;

/// Errors surfaced by a [`RecordStore`](crate::RecordStore) implementation.
///
/// These are never masked as empty results: a caller receiving `Ok(empty)`
/// knows the store was reachable and held nothing for the key.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached, timed out, or its state is unusable
    #[error("Transport error: {0}")]
    Transport(String),

    /// A key holds a value of a different kind than the operation expects
    /// (e.g. a set operation against a plain payload key)
    #[error("Wrong type for key {key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, StoreError>;
