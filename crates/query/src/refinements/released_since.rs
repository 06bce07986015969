//! Release-year window.

use crate::traits::Refinement;
use indexer::Movie;

/// Keeps records released in or after `year`. Records without a year are
/// treated as year 0 and dropped.
pub struct ReleasedSinceFilter {
    year: i32,
}

impl ReleasedSinceFilter {
    pub fn new(year: i32) -> Self {
        Self { year }
    }
}

impl Refinement for ReleasedSinceFilter {
    fn name(&self) -> &str {
        "ReleasedSinceFilter"
    }

    fn keep(&self, movie: &Movie) -> bool {
        movie.year.unwrap_or(0) >= self.year
    }
}
