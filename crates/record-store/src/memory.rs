//! In-memory implementation of [`RecordStore`].
//!
//! All keys live in one `BTreeMap` so prefix scans and prefix deletes are
//! ordered range walks. Ordered sets keep a member -> score map next to a
//! `(score, member)` tree, which gives deterministic ordering for equal scores.

use crate::error::{Result, StoreError};
use crate::store::{RecordStore, ScanPage, ScoredMember};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// `f64` with a total order, used as the sort key of ordered sets.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, f64>,
    order: BTreeSet<(Score, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: f64) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.order.remove(&(Score(old), member.to_string()));
        }
        self.order.insert((Score(score), member.to_string()));
    }

    /// Score descending; members sharing a score stay in ascending order.
    fn descending(&self) -> impl Iterator<Item = ScoredMember> + '_ {
        let mut scores: Vec<Score> = self.order.iter().map(|(score, _)| *score).collect();
        scores.dedup();
        scores.into_iter().rev().flat_map(move |score| {
            self.order
                .range((score, String::new())..)
                .take_while(move |(s, _)| *s == score)
                .map(|(s, member)| ScoredMember::new(member.clone(), s.0))
        })
    }
}

#[derive(Debug)]
enum Value {
    Bytes(Vec<u8>),
    Set(BTreeSet<String>),
    Sorted(SortedSet),
}

/// Thread-safe in-memory store.
///
/// Readers share a `RwLock`; no lock is held across calls, so a long query
/// never blocks a writer for more than one operation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of keys of any kind.
    pub fn len(&self) -> usize {
        self.read().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Value>>> {
        self.data
            .read()
            .map_err(|_| StoreError::Transport("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Value>>> {
        self.data
            .write()
            .map_err(|_| StoreError::Transport("memory store lock poisoned".to_string()))
    }
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
    }
}

fn as_set<'a>(data: &'a BTreeMap<String, Value>, key: &str) -> Result<Option<&'a BTreeSet<String>>> {
    match data.get(key) {
        None => Ok(None),
        Some(Value::Set(set)) => Ok(Some(set)),
        Some(_) => Err(wrong_type(key, "set")),
    }
}

fn as_sorted<'a>(data: &'a BTreeMap<String, Value>, key: &str) -> Result<Option<&'a SortedSet>> {
    match data.get(key) {
        None => Ok(None),
        Some(Value::Sorted(sorted)) => Ok(Some(sorted)),
        Some(_) => Err(wrong_type(key, "ordered set")),
    }
}

/// Keys of `data` that start with `prefix`, in order, starting after `after`.
fn prefixed_keys<'a>(
    data: &'a BTreeMap<String, Value>,
    prefix: &'a str,
    after: Option<&'a str>,
) -> impl Iterator<Item = &'a String> + 'a {
    let start = match after {
        Some(token) if token >= prefix => Bound::Excluded(token.to_string()),
        _ => Bound::Included(prefix.to_string()),
    };
    data.range((start, Bound::Unbounded))
        .map(|(key, _)| key)
        .take_while(move |key| key.starts_with(prefix))
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let data = self.read()?;
        match data.get(key) {
            None => Ok(None),
            Some(Value::Bytes(bytes)) => Ok(Some(bytes.clone())),
            Some(_) => Err(wrong_type(key, "payload")),
        }
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.write()?.insert(key.to_string(), Value::Bytes(value));
        Ok(())
    }

    fn batch_get(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let data = self.read()?;
        let found = keys
            .iter()
            .filter_map(|key| match data.get(key) {
                Some(Value::Bytes(bytes)) => Some((key.clone(), bytes.clone())),
                _ => None,
            })
            .collect();
        Ok(found)
    }

    fn scan_keys_by_prefix(
        &self,
        prefix: &str,
        token: Option<&str>,
        count: usize,
    ) -> Result<ScanPage> {
        let count = count.max(1);
        let data = self.read()?;
        let mut keys: Vec<String> = prefixed_keys(&data, prefix, token)
            .take(count + 1)
            .cloned()
            .collect();

        let next = if keys.len() > count {
            keys.truncate(count);
            keys.last().cloned()
        } else {
            None
        };
        Ok(ScanPage { next, keys })
    }

    fn add_to_set(&self, key: &str, member: &str) -> Result<bool> {
        let mut data = self.write()?;
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()))
        {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(wrong_type(key, "set")),
        }
    }

    fn remove_from_set(&self, key: &str, member: &str) -> Result<bool> {
        let mut data = self.write()?;
        let (removed, now_empty) = match data.get_mut(key) {
            None => return Ok(false),
            Some(Value::Set(set)) => (set.remove(member), set.is_empty()),
            Some(_) => return Err(wrong_type(key, "set")),
        };
        // An emptied set disappears, like any other missing key.
        if now_empty {
            data.remove(key);
        }
        Ok(removed)
    }

    fn members_of_set(&self, key: &str) -> Result<BTreeSet<String>> {
        let data = self.read()?;
        Ok(as_set(&data, key)?.cloned().unwrap_or_default())
    }

    fn set_cardinality(&self, key: &str) -> Result<usize> {
        let data = self.read()?;
        Ok(as_set(&data, key)?.map_or(0, |set| set.len()))
    }

    fn intersect_sets(&self, keys: &[String]) -> Result<BTreeSet<String>> {
        let data = self.read()?;
        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            match as_set(&data, key)? {
                Some(set) => sets.push(set),
                None => return Ok(BTreeSet::new()),
            }
        }
        // Probe from the smallest set so work is bounded by the result size.
        sets.sort_by_key(|set| set.len());
        let Some((smallest, rest)) = sets.split_first() else {
            return Ok(BTreeSet::new());
        };
        Ok(smallest
            .iter()
            .filter(|member| rest.iter().all(|set| set.contains(*member)))
            .cloned()
            .collect())
    }

    fn delete_keys_by_prefix(&self, prefix: &str) -> Result<usize> {
        let mut data = self.write()?;
        let doomed: Vec<String> = prefixed_keys(&data, prefix, None).cloned().collect();
        for key in &doomed {
            data.remove(key);
        }
        debug!("Deleted {} keys under prefix {}", doomed.len(), prefix);
        Ok(doomed.len())
    }

    fn add_to_ordered_set(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut data = self.write()?;
        match data
            .entry(key.to_string())
            .or_insert_with(|| Value::Sorted(SortedSet::default()))
        {
            Value::Sorted(sorted) => {
                sorted.insert(member, score);
                Ok(())
            }
            _ => Err(wrong_type(key, "ordered set")),
        }
    }

    fn range_by_score_descending(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<ScoredMember>> {
        let data = self.read()?;
        let Some(sorted) = as_sorted(&data, key)? else {
            return Ok(Vec::new());
        };
        Ok(sorted
            .descending()
            .skip_while(|entry| entry.score > max)
            .take_while(|entry| entry.score >= min)
            .collect())
    }

    fn top_n_descending(&self, key: &str, n: usize) -> Result<Vec<ScoredMember>> {
        let data = self.read()?;
        let Some(sorted) = as_sorted(&data, key)? else {
            return Ok(Vec::new());
        };
        Ok(sorted.descending().take(n).collect())
    }

    fn range_with_scores(&self, key: &str) -> Result<Vec<ScoredMember>> {
        let data = self.read()?;
        let Some(sorted) = as_sorted(&data, key)? else {
            return Ok(Vec::new());
        };
        Ok(sorted
            .order
            .iter()
            .map(|(score, member)| ScoredMember::new(member.clone(), score.0))
            .collect())
    }
}
