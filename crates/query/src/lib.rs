//! # Query Crate
//!
//! Read-only queries over the indexes published by the
//! [`indexer`] crate.
//!
//! ## Main Components
//!
//! - **executor**: QueryExecutor, with lookups, intersections, numeric ranges
//!   and scoped top-K rankings
//! - **fetch**: BatchFetcher, chunked parallel retrieval of primary records
//! - **refine**: compound queries that narrow by index, then refine in memory
//! - **aggregate**: group-by aggregations over index buckets
//! - **traits** / **refinement_pipeline** / **refinements**: composable
//!   in-memory predicates
//!
//! ## Example Usage
//!
//! ```ignore
//! use indexer::{CategoricalAttribute, NumericField};
//! use query::QueryExecutor;
//!
//! let executor = QueryExecutor::new(store.clone());
//!
//! let dramas = executor.lookup(CategoricalAttribute::Genre, "Drama")?;
//! let acclaimed = executor.range(NumericField::Rating, 8.0, f64::INFINITY)?;
//! let best_of_2010 = executor.top_in_genre_where("Drama", CategoricalAttribute::Year, "2010", 5)?;
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod refine;
pub mod refinement_pipeline;
pub mod refinements;
pub mod traits;

pub use aggregate::{ActorCount, GenreCombination, GenreRating, Summary, YearCount, YearlyTrend};
pub use config::QueryConfig;
pub use error::{QueryError, Result};
pub use executor::{QueryExecutor, Snapshot};
pub use fetch::BatchFetcher;
pub use refinement_pipeline::RefinementPipeline;
pub use traits::Refinement;
