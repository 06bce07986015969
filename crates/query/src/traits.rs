//! Core trait for refining candidate sets.
//!
//! Index lookups narrow the store to a candidate set; a [`Refinement`] then
//! applies a predicate the indexes cannot answer on their own, such as a
//! revenue-to-budget ratio, to the fetched records.

use indexer::Movie;

/// A predicate over fetched records.
///
/// `Send + Sync` so refinements can be shared across query threads.
pub trait Refinement: Send + Sync {
    /// Returns the name of this refinement (for logging)
    fn name(&self) -> &str;

    /// Whether `movie` survives this refinement.
    fn keep(&self, movie: &Movie) -> bool;

    /// Apply this refinement to a set of records (takes ownership).
    fn apply(&self, movies: Vec<Movie>) -> Vec<Movie> {
        movies.into_iter().filter(|movie| self.keep(movie)).collect()
    }
}
