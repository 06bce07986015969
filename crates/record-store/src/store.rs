//! The store interface the indexing and query layers are written against.
//!
//! The operations mirror a flat key-value store with set and sorted-set
//! primitives. Every call is one round trip; implementations must not
//! retry on their own, a failed call surfaces as [`StoreError::Transport`].
//!
//! [`StoreError::Transport`]: crate::StoreError::Transport

use crate::error::Result;
use std::collections::{BTreeSet, HashMap};

/// A member of an ordered set together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

/// One page of a prefix scan.
///
/// `next` is the token to pass back for the following page; `None` means the
/// scan is exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub next: Option<String>,
    pub keys: Vec<String>,
}

/// Primary key-value store with set and ordered-set primitives.
///
/// `Send + Sync` so one handle can be shared (behind an `Arc`) by any number
/// of concurrent readers and a single rebuild.
pub trait RecordStore: Send + Sync {
    /// Fetch a single payload.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a single payload, replacing whatever the key held.
    fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Fetch many payloads in one round trip. Absent keys are omitted.
    fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>>;

    /// Return up to `count` keys starting with `prefix`, resuming after `token`.
    fn scan_keys_by_prefix(
        &self,
        prefix: &str,
        token: Option<&str>,
        count: usize,
    ) -> Result<ScanPage>;

    /// Add `member` to the set at `key`. Returns `true` if it was not present.
    fn add_to_set(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove `member` from the set at `key`. Returns `true` if it was present.
    fn remove_from_set(&self, key: &str, member: &str) -> Result<bool>;

    fn members_of_set(&self, key: &str) -> Result<BTreeSet<String>>;

    fn set_cardinality(&self, key: &str) -> Result<usize>;

    /// Members present in every listed set. A missing key is an empty set.
    fn intersect_sets(&self, keys: &[String]) -> Result<BTreeSet<String>>;

    /// Delete every key starting with `prefix`. Returns the number deleted.
    fn delete_keys_by_prefix(&self, prefix: &str) -> Result<usize>;

    /// Insert or re-score `member` in the ordered set at `key`.
    fn add_to_ordered_set(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Members with `min <= score <= max`, highest score first.
    /// Infinite bounds are accepted.
    fn range_by_score_descending(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<ScoredMember>>;

    /// The `n` highest-scored members, highest first.
    fn top_n_descending(&self, key: &str, n: usize) -> Result<Vec<ScoredMember>>;

    /// Every member with its score, lowest score first.
    fn range_with_scores(&self, key: &str) -> Result<Vec<ScoredMember>>;
}
