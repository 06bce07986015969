//! Core domain types for indexed movie records.
//!
//! A [`Movie`] is the normalized attribute bundle the field extractor derives
//! from one raw record. The two attribute enums name the managed indexes:
//! every inverted index belongs to a [`CategoricalAttribute`] and every global
//! ordered index to a [`NumericField`].

use crate::error::UnknownAttribute;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Type Aliases
// =============================================================================

/// Store key of a primary record, e.g. `movie:603`
pub type RecordKey = String;

// =============================================================================
// Attributes
// =============================================================================

/// Attributes with an inverted index (value -> set of record keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CategoricalAttribute {
    Genre,
    Actor,
    Director,
    Year,
    Language,
    Country,
}

impl CategoricalAttribute {
    pub const ALL: [CategoricalAttribute; 6] = [
        CategoricalAttribute::Genre,
        CategoricalAttribute::Actor,
        CategoricalAttribute::Director,
        CategoricalAttribute::Year,
        CategoricalAttribute::Language,
        CategoricalAttribute::Country,
    ];

    /// Namespace segment used in index keys
    pub fn namespace(self) -> &'static str {
        match self {
            CategoricalAttribute::Genre => "genre",
            CategoricalAttribute::Actor => "actor",
            CategoricalAttribute::Director => "director",
            CategoricalAttribute::Year => "year",
            CategoricalAttribute::Language => "language",
            CategoricalAttribute::Country => "country",
        }
    }
}

impl fmt::Display for CategoricalAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

impl FromStr for CategoricalAttribute {
    type Err = UnknownAttribute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoricalAttribute::ALL
            .into_iter()
            .find(|attr| attr.namespace() == s)
            .ok_or_else(|| UnknownAttribute {
                kind: "categorical",
                name: s.to_string(),
            })
    }
}

/// Numeric attributes with a global ordered index (record key -> score).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NumericField {
    Rating,
    ExternalRating,
    Budget,
    Revenue,
    Runtime,
    Popularity,
    VoteCount,
}

impl NumericField {
    pub const ALL: [NumericField; 7] = [
        NumericField::Rating,
        NumericField::ExternalRating,
        NumericField::Budget,
        NumericField::Revenue,
        NumericField::Runtime,
        NumericField::Popularity,
        NumericField::VoteCount,
    ];

    /// Name used in index keys (`zset:<name>`)
    pub fn name(self) -> &'static str {
        match self {
            NumericField::Rating => "rating",
            NumericField::ExternalRating => "external_rating",
            NumericField::Budget => "budget",
            NumericField::Revenue => "revenue",
            NumericField::Runtime => "runtime",
            NumericField::Popularity => "popularity",
            NumericField::VoteCount => "vote_count",
        }
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NumericField {
    type Err = UnknownAttribute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NumericField::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| UnknownAttribute {
                kind: "numeric",
                name: s.to_string(),
            })
    }
}

// =============================================================================
// Movie
// =============================================================================

/// Coerced numeric attributes.
///
/// Missing or malformed source values are `0.0`, which the indexes treat as
/// "unknown". A genuinely zero budget cannot be told apart from a missing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericValues {
    pub rating: f64,
    pub external_rating: f64,
    pub budget: f64,
    pub revenue: f64,
    pub runtime: f64,
    pub popularity: f64,
    pub vote_count: f64,
}

/// Normalized attributes of one primary record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub key: RecordKey,
    pub id: Option<String>,
    pub title: Option<String>,
    /// Primary (first-billed) actor
    pub actor: Option<String>,
    pub director: Option<String>,
    pub language: Option<String>,
    /// `None` when the raw year was absent or invalid
    pub year: Option<i32>,
    /// Distinct genres in source order
    pub genres: Vec<String>,
    /// Distinct production countries in source order
    pub countries: Vec<String>,
    pub numbers: NumericValues,
}

impl Movie {
    /// Values this movie contributes to the inverted index of `attr`.
    pub fn categorical_values(&self, attr: CategoricalAttribute) -> Vec<String> {
        match attr {
            CategoricalAttribute::Genre => self.genres.clone(),
            CategoricalAttribute::Country => self.countries.clone(),
            CategoricalAttribute::Actor => self.actor.iter().cloned().collect(),
            CategoricalAttribute::Director => self.director.iter().cloned().collect(),
            CategoricalAttribute::Language => self.language.iter().cloned().collect(),
            CategoricalAttribute::Year => self.year.iter().map(|y| y.to_string()).collect(),
        }
    }

    pub fn numeric(&self, field: NumericField) -> f64 {
        let n = &self.numbers;
        match field {
            NumericField::Rating => n.rating,
            NumericField::ExternalRating => n.external_rating,
            NumericField::Budget => n.budget,
            NumericField::Revenue => n.revenue,
            NumericField::Runtime => n.runtime,
            NumericField::Popularity => n.popularity,
            NumericField::VoteCount => n.vote_count,
        }
    }

    pub fn profit(&self) -> f64 {
        self.numbers.revenue - self.numbers.budget
    }

    /// Revenue over budget; `None` when the budget is unknown.
    pub fn roi(&self) -> Option<f64> {
        (self.numbers.budget > 0.0).then(|| self.numbers.revenue / self.numbers.budget)
    }

    /// Title for display, falling back to the record key.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.key)
    }
}
