//! # Record Store Crate
//!
//! The primary key-value store that holds serialized movie records and the
//! derived secondary indexes.
//!
//! ## Main Components
//!
//! - **store**: the [`RecordStore`] trait every other crate is written against
//! - **memory**: [`MemoryStore`], a thread-safe in-memory implementation
//! - **error**: [`StoreError`], transport and type errors
//!
//! The indexing and query crates never hold a process-wide handle: each
//! component receives an `Arc<S: RecordStore>` in its constructor.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::{RecordStore, ScanPage, ScoredMember};
