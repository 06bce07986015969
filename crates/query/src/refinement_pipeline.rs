//! The RefinementPipeline chains refinements over fetched records.

use crate::traits::Refinement;
use indexer::Movie;

/// Chains multiple refinements into one pass over a candidate set.
///
/// ## Usage
/// ```ignore
/// let pipeline = RefinementPipeline::new()
///     .add_refinement(ReleasedSinceFilter::new(2000))
///     .add_refinement(MinimumFilter::at_least(NumericField::VoteCount, 100.0));
///
/// let survivors = pipeline.apply(movies);
/// ```
pub struct RefinementPipeline {
    refinements: Vec<Box<dyn Refinement>>,
}

impl RefinementPipeline {
    pub fn new() -> Self {
        Self {
            refinements: Vec::new(),
        }
    }

    /// Add a refinement to the pipeline (builder pattern).
    pub fn add_refinement(mut self, refinement: impl Refinement + 'static) -> Self {
        self.refinements.push(Box::new(refinement));
        self
    }

    pub fn len(&self) -> usize {
        self.refinements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refinements.is_empty()
    }

    /// Apply all refinements in order, logging the count after each stage.
    pub fn apply(&self, movies: Vec<Movie>) -> Vec<Movie> {
        let mut current = movies;
        for refinement in &self.refinements {
            let before = current.len();
            current = refinement.apply(current);
            tracing::debug!(
                "Refinement {}: {} -> {} records",
                refinement.name(),
                before,
                current.len()
            );
        }
        current
    }
}

impl Default for RefinementPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinements::{MinimumFilter, ReleasedSinceFilter};
    use indexer::NumericField;

    fn movie(key: &str, year: Option<i32>, rating: f64) -> Movie {
        let mut movie = Movie {
            key: key.to_string(),
            year,
            ..Movie::default()
        };
        movie.numbers.rating = rating;
        movie
    }

    #[test]
    fn test_empty_pipeline() {
        let pipeline = RefinementPipeline::new();
        assert!(pipeline.is_empty());

        let movies = vec![movie("a", Some(2000), 5.0), movie("b", None, 0.0)];
        assert_eq!(pipeline.apply(movies).len(), 2);
    }

    #[test]
    fn test_refinements_compose() {
        let pipeline = RefinementPipeline::new()
            .add_refinement(ReleasedSinceFilter::new(2010))
            .add_refinement(MinimumFilter::above(NumericField::Rating, 0.0));
        assert_eq!(pipeline.len(), 2);

        let movies = vec![
            movie("old", Some(1999), 8.0),
            movie("unrated", Some(2015), 0.0),
            movie("kept", Some(2012), 6.5),
            movie("undated", None, 9.0),
        ];
        let survivors = pipeline.apply(movies);

        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].key, "kept");
    }
}
