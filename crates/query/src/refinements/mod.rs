//! Refinement implementations for compound queries.

pub mod genre_match;
pub mod minimum;
pub mod released_since;
pub mod revenue_multiple;

pub use genre_match::GenreMatchFilter;
pub use minimum::MinimumFilter;
pub use released_since::ReleasedSinceFilter;
pub use revenue_multiple::RevenueMultipleFilter;
