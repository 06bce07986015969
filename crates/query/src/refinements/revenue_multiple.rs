//! Revenue relative to budget.

use crate::traits::Refinement;
use indexer::Movie;

/// Keeps records with a known budget whose revenue strictly exceeds
/// `budget * multiple`.
pub struct RevenueMultipleFilter {
    multiple: f64,
}

impl RevenueMultipleFilter {
    pub fn new(multiple: f64) -> Self {
        Self { multiple }
    }

    /// Revenue strictly greater than budget.
    pub fn profitable() -> Self {
        Self::new(1.0)
    }
}

impl Refinement for RevenueMultipleFilter {
    fn name(&self) -> &str {
        "RevenueMultipleFilter"
    }

    fn keep(&self, movie: &Movie) -> bool {
        let budget = movie.numbers.budget;
        budget > 0.0 && movie.numbers.revenue > budget * self.multiple
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(budget: f64, revenue: f64) -> Movie {
        let mut movie = Movie::default();
        movie.numbers.budget = budget;
        movie.numbers.revenue = revenue;
        movie
    }

    #[test]
    fn test_multiple_is_strict() {
        let filter = RevenueMultipleFilter::new(2.0);
        assert!(filter.keep(&movie(10.0, 20.5)));
        assert!(!filter.keep(&movie(10.0, 20.0)));
    }

    #[test]
    fn test_unknown_budget_never_qualifies() {
        assert!(!RevenueMultipleFilter::profitable().keep(&movie(0.0, 1_000.0)));
    }
}
