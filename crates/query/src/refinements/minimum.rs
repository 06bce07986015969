//! Threshold on a single numeric field.

use crate::traits::Refinement;
use indexer::{Movie, NumericField};

/// Keeps records whose coerced `field` clears a threshold.
///
/// Missing values coerce to 0, so `above(field, 0.0)` doubles as a
/// "field is known" check.
pub struct MinimumFilter {
    field: NumericField,
    threshold: f64,
    inclusive: bool,
    name: String,
}

impl MinimumFilter {
    /// `field >= threshold`
    pub fn at_least(field: NumericField, threshold: f64) -> Self {
        Self {
            field,
            threshold,
            inclusive: true,
            name: format!("{} >= {}", field, threshold),
        }
    }

    /// `field > threshold`
    pub fn above(field: NumericField, threshold: f64) -> Self {
        Self {
            field,
            threshold,
            inclusive: false,
            name: format!("{} > {}", field, threshold),
        }
    }
}

impl Refinement for MinimumFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn keep(&self, movie: &Movie) -> bool {
        let value = movie.numeric(self.field);
        if self.inclusive {
            value >= self.threshold
        } else {
            value > self.threshold
        }
    }
}
