//! # Indexer Crate
//!
//! This crate derives secondary indexes over movie records held in a
//! [`RecordStore`](record_store::RecordStore).
//!
//! ## Main Components
//!
//! - **types**: Domain types (Movie, CategoricalAttribute, NumericField)
//! - **parser**: Field extraction from loosely typed JSON records
//! - **keys**: Generation-tagged index key layout and the publish pointer
//! - **index**: IndexBuilder, which rebuilds and atomically publishes indexes
//! - **ingest**: Loading JSON-lines records into the store
//! - **error**: Error types for loading and indexing
//!
//! ## Example Usage
//!
//! ```ignore
//! use indexer::{IndexBuilder, IndexConfig};
//! use record_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! indexer::ingest::load_json_lines_file(&*store, Path::new("data/movies.jsonl"), "movie:")?;
//!
//! let builder = IndexBuilder::new(store.clone())
//!     .with_config(IndexConfig::default().with_max_records(10_000));
//! let report = builder.rebuild()?;
//!
//! println!("Indexed {} movies ({} skipped)", report.processed, report.skipped);
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod keys;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use config::IndexConfig;
pub use error::{IndexError, Result, UnknownAttribute};
pub use index::{IndexBuilder, RebuildReport};
pub use ingest::LoadReport;
pub use keys::Generation;
pub use types::{CategoricalAttribute, Movie, NumericField, NumericValues, RecordKey};
