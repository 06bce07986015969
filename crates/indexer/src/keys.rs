//! Index key layout.
//!
//! Every index key lives under a generation prefix:
//!
//! ```text
//! idx:<gen>:genre:<value>        set of record keys
//! idx:<gen>:top_rated:<genre>    ordered set, record key -> rating
//! idx:<gen>:zset:<field>         ordered set, record key -> field value
//! idx:current                    published generation number
//! idx:generations                set of generations present in the store
//! ```
//!
//! Readers resolve `idx:current` once and then only touch keys of that one
//! generation, so a rebuild writing the next generation is invisible to them
//! until the pointer moves.

use crate::error::{IndexError, Result};
use crate::types::{CategoricalAttribute, NumericField};
use record_store::RecordStore;
use std::fmt;

pub const CURRENT_GENERATION_KEY: &str = "idx:current";
pub const GENERATIONS_KEY: &str = "idx:generations";
pub const TOP_RATED_NAMESPACE: &str = "top_rated";
pub const NUMERIC_NAMESPACE: &str = "zset";

/// One complete, internally consistent version of the index set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Generation {
    pub const FIRST: Generation = Generation(1);

    pub fn next(self) -> Generation {
        Generation(self.0 + 1)
    }

    /// Prefix shared by every key of this generation
    pub fn prefix(self) -> String {
        format!("idx:{}:", self.0)
    }

    pub fn categorical_key(self, attr: CategoricalAttribute, value: &str) -> String {
        format!("idx:{}:{}:{}", self.0, attr.namespace(), value)
    }

    /// Prefix of every bucket of `attr`; strip it to recover the value.
    pub fn categorical_prefix(self, attr: CategoricalAttribute) -> String {
        format!("idx:{}:{}:", self.0, attr.namespace())
    }

    pub fn top_rated_key(self, genre: &str) -> String {
        format!("idx:{}:{}:{}", self.0, TOP_RATED_NAMESPACE, genre)
    }

    pub fn numeric_key(self, field: NumericField) -> String {
        format!("idx:{}:{}:{}", self.0, NUMERIC_NAMESPACE, field.name())
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read the published generation, `None` if nothing was ever published.
pub fn current_generation<S: RecordStore + ?Sized>(store: &S) -> Result<Option<Generation>> {
    let Some(raw) = store.get(CURRENT_GENERATION_KEY)? else {
        return Ok(None);
    };
    let text = String::from_utf8_lossy(&raw);
    text.trim()
        .parse::<u64>()
        .map(|g| Some(Generation(g)))
        .map_err(|_| IndexError::CorruptPointer(text.into_owned()))
}

/// Every generation recorded in the store, ascending.
pub fn known_generations<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<Generation>> {
    let mut generations: Vec<Generation> = store
        .members_of_set(GENERATIONS_KEY)?
        .iter()
        .filter_map(|g| g.parse().ok().map(Generation))
        .collect();
    generations.sort();
    Ok(generations)
}
