//! Overlap with a wanted set of genres.

use crate::traits::Refinement;
use indexer::Movie;
use std::collections::HashSet;

/// Keeps records carrying at least `min_matches` of the wanted genres.
pub struct GenreMatchFilter {
    wanted: HashSet<String>,
    min_matches: usize,
}

impl GenreMatchFilter {
    pub fn new<I, G>(wanted: I, min_matches: usize) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        Self {
            wanted: wanted.into_iter().map(Into::into).collect(),
            min_matches,
        }
    }

    /// Number of wanted genres `movie` carries.
    pub fn matches(&self, movie: &Movie) -> usize {
        movie
            .genres
            .iter()
            .filter(|genre| self.wanted.contains(genre.as_str()))
            .count()
    }
}

impl Refinement for GenreMatchFilter {
    fn name(&self) -> &str {
        "GenreMatchFilter"
    }

    fn keep(&self, movie: &Movie) -> bool {
        self.matches(movie) >= self.min_matches
    }
}
