//! Rebuild Integration Tests
//!
//! Tests for rebuild invariants:
//! - Every record lands in exactly the buckets its attributes imply, and no others
//! - Rebuild is idempotent on an unchanged store
//! - A store failure mid-scan leaves the published generation untouched
//! - Rebuilds never overlap

use indexer::keys::{self, Generation};
use indexer::{CategoricalAttribute, IndexBuilder, IndexConfig, IndexError, NumericField};
use record_store::{MemoryStore, RecordStore, Result as StoreResult, ScanPage, ScoredMember, StoreError};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

// =============================================================================
// Helper Store
// =============================================================================

/// Wraps a MemoryStore, optionally failing or pausing record scans.
#[derive(Default)]
struct TestStore {
    inner: MemoryStore,
    /// Fail every scan once this many scans succeeded
    fail_after_scans: Option<usize>,
    scans: AtomicUsize,
    failing: AtomicBool,
    /// Signal on entering a scan, then wait for a release
    gate: Option<(Mutex<Sender<()>>, Mutex<Receiver<()>>)>,
}

impl TestStore {
    fn failing_after(scans: usize) -> Self {
        Self {
            fail_after_scans: Some(scans),
            ..Self::default()
        }
    }
}

impl RecordStore for TestStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }
    fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.inner.put(key, value)
    }
    fn batch_get(&self, keys: &[String]) -> StoreResult<HashMap<String, Vec<u8>>> {
        self.inner.batch_get(keys)
    }
    fn scan_keys_by_prefix(&self, prefix: &str, token: Option<&str>, count: usize) -> StoreResult<ScanPage> {
        if prefix == "movie:" {
            if let Some((entered, release)) = &self.gate {
                entered.lock().unwrap().send(()).unwrap();
                release.lock().unwrap().recv().unwrap();
            }
            let done = self.scans.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) && self.fail_after_scans.is_some_and(|n| done >= n) {
                return Err(StoreError::Transport("connection reset".to_string()));
            }
        }
        self.inner.scan_keys_by_prefix(prefix, token, count)
    }
    fn add_to_set(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.add_to_set(key, member)
    }
    fn remove_from_set(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.remove_from_set(key, member)
    }
    fn members_of_set(&self, key: &str) -> StoreResult<BTreeSet<String>> {
        self.inner.members_of_set(key)
    }
    fn set_cardinality(&self, key: &str) -> StoreResult<usize> {
        self.inner.set_cardinality(key)
    }
    fn intersect_sets(&self, keys: &[String]) -> StoreResult<BTreeSet<String>> {
        self.inner.intersect_sets(keys)
    }
    fn delete_keys_by_prefix(&self, prefix: &str) -> StoreResult<usize> {
        self.inner.delete_keys_by_prefix(prefix)
    }
    fn add_to_ordered_set(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.inner.add_to_ordered_set(key, member, score)
    }
    fn range_by_score_descending(&self, key: &str, min: f64, max: f64) -> StoreResult<Vec<ScoredMember>> {
        self.inner.range_by_score_descending(key, min, max)
    }
    fn top_n_descending(&self, key: &str, n: usize) -> StoreResult<Vec<ScoredMember>> {
        self.inner.top_n_descending(key, n)
    }
    fn range_with_scores(&self, key: &str) -> StoreResult<Vec<ScoredMember>> {
        self.inner.range_with_scores(key)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn seed<S: RecordStore>(store: &S, count: usize) {
    let genres = ["Drama", "Action", "Comedy"];
    for i in 0..count {
        let record = json!({
            "id": i,
            "title": format!("Movie {}", i),
            "genres_list": format!("['{}', '{}']", genres[i % 3], genres[(i + 1) % 3]),
            "Star1": format!("Actor {}", i % 4),
            "release_year": 1990 + (i % 5) as i64,
            "vote_average": (i % 10) as f64,
            "budget": (i * 1000) as f64,
        });
        store
            .put(&format!("movie:{:04}", i), serde_json::to_vec(&record).unwrap())
            .unwrap();
    }
}

/// Every index key of a generation (prefix stripped) with its contents.
fn snapshot<S: RecordStore>(store: &S, generation: Generation) -> BTreeMap<String, Vec<String>> {
    let prefix = generation.prefix();
    let page = store.scan_keys_by_prefix(&prefix, None, 100_000).unwrap();
    page.keys
        .iter()
        .map(|key| {
            let contents = match store.members_of_set(key) {
                Ok(members) => members.into_iter().collect(),
                Err(StoreError::WrongType { .. }) => store
                    .range_with_scores(key)
                    .unwrap()
                    .into_iter()
                    .map(|m| format!("{}={}", m.member, m.score))
                    .collect(),
                Err(e) => panic!("unexpected store error: {e}"),
            };
            (key[prefix.len()..].to_string(), contents)
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

/// Each record is in genre:g and top_rated:g for every genre g when rated.
#[test]
fn test_every_genre_membership_and_scoped_score() {
    let store = Arc::new(MemoryStore::new());
    seed(&*store, 30);
    let g = IndexBuilder::new(store.clone()).rebuild().unwrap().generation.unwrap();

    for i in 0..30usize {
        let key = format!("movie:{:04}", i);
        let rating = (i % 10) as f64;
        let movie = indexer::parser::parse_record(&key, &store.get(&key).unwrap().unwrap()).unwrap();
        for genre in &movie.genres {
            let members = store
                .members_of_set(&g.categorical_key(CategoricalAttribute::Genre, genre))
                .unwrap();
            assert!(members.contains(&key));

            let ranked = store.range_with_scores(&g.top_rated_key(genre)).unwrap();
            let entry = ranked.iter().find(|m| m.member == key);
            if rating > 0.0 {
                assert_eq!(entry.map(|m| m.score), Some(rating));
            } else {
                assert!(entry.is_none(), "unrated {key} must not be ranked");
            }
        }
    }
}

/// The full key set of a generation, for one record carrying every
/// attribute and one whose numeric fields are all zero, empty or absent.
#[test]
fn test_generation_holds_exactly_the_implied_indexes() {
    let store = Arc::new(MemoryStore::new());
    let complete = json!({
        "id": 1,
        "title": "Complete",
        "Star1": "Lead Actor",
        "Director": "Some Director",
        "original_language": "en",
        "release_year": 1999,
        "genres_list": "['Action', 'Drama']",
        "production_countries": "['France', 'Japan']",
        "vote_average": 8.5,
        "IMDB_Rating": 7.9,
        "budget": 1000,
        "revenue": 5000,
        "runtime": 120,
        "popularity": 12.5,
        "vote_count": 300,
    });
    let unscored = json!({
        "id": 2,
        "title": "Unscored",
        "original_language": "fr",
        "genres_list": "Comedy",
        "vote_average": 0,
        "IMDB_Rating": "",
        "budget": "0",
        "revenue": "nan",
    });
    store.put("movie:1", serde_json::to_vec(&complete).unwrap()).unwrap();
    store.put("movie:2", serde_json::to_vec(&unscored).unwrap()).unwrap();

    let g = IndexBuilder::new(store.clone()).rebuild().unwrap().generation.unwrap();

    let entry = |key: &str, members: &[&str]| {
        (key.to_string(), members.iter().map(|m| m.to_string()).collect::<Vec<_>>())
    };
    let expected: BTreeMap<String, Vec<String>> = [
        entry("actor:Lead Actor", &["movie:1"]),
        entry("country:France", &["movie:1"]),
        entry("country:Japan", &["movie:1"]),
        entry("director:Some Director", &["movie:1"]),
        entry("genre:Action", &["movie:1"]),
        entry("genre:Comedy", &["movie:2"]),
        entry("genre:Drama", &["movie:1"]),
        entry("language:en", &["movie:1"]),
        entry("language:fr", &["movie:2"]),
        entry("top_rated:Action", &["movie:1=8.5"]),
        entry("top_rated:Drama", &["movie:1=8.5"]),
        entry("year:1999", &["movie:1"]),
        entry("zset:budget", &["movie:1=1000"]),
        entry("zset:external_rating", &["movie:1=7.9"]),
        entry("zset:popularity", &["movie:1=12.5"]),
        entry("zset:rating", &["movie:1=8.5"]),
        entry("zset:revenue", &["movie:1=5000"]),
        entry("zset:runtime", &["movie:1=120"]),
        entry("zset:vote_count", &["movie:1=300"]),
    ]
    .into_iter()
    .collect();

    assert_eq!(snapshot(&*store, g), expected);
}

#[test]
fn test_rebuild_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    seed(&*store, 50);
    let builder = IndexBuilder::new(store.clone());

    let first = builder.rebuild().unwrap().generation.unwrap();
    let second = builder.rebuild().unwrap().generation.unwrap();

    assert_ne!(first, second);
    let a = snapshot(&*store, first);
    let b = snapshot(&*store, second);
    assert!(!a.is_empty());
    assert_eq!(a, b);
}

#[test]
fn test_cardinality_matches_members() {
    let store = Arc::new(MemoryStore::new());
    seed(&*store, 40);
    let g = IndexBuilder::new(store.clone()).rebuild().unwrap().generation.unwrap();

    for attr in CategoricalAttribute::ALL {
        let page = store.scan_keys_by_prefix(&g.categorical_prefix(attr), None, 10_000).unwrap();
        for key in page.keys {
            assert_eq!(
                store.set_cardinality(&key).unwrap(),
                store.members_of_set(&key).unwrap().len()
            );
        }
    }
}

#[test]
fn test_failed_rebuild_keeps_published_generation() {
    let store = Arc::new(TestStore::failing_after(1));
    seed(&*store, 30);
    let builder = IndexBuilder::new(store.clone())
        .with_config(IndexConfig::default().with_page_size(10));

    let published = builder.rebuild().unwrap().generation.unwrap();
    let before = snapshot(&*store, published);

    // Second rebuild: first page scans fine, the second scan fails.
    store.scans.store(0, Ordering::SeqCst);
    store.failing.store(true, Ordering::SeqCst);
    let err = builder.rebuild().unwrap_err();
    assert!(matches!(err, IndexError::Store(StoreError::Transport(_))));

    assert_eq!(keys::current_generation(&*store).unwrap(), Some(published));
    assert_eq!(snapshot(&*store, published), before);
    // The partial generation was discarded.
    assert_eq!(keys::known_generations(&*store).unwrap(), vec![published]);
    let partial = snapshot(&*store, published.next());
    assert!(partial.is_empty());

    // And the next successful rebuild still works.
    store.failing.store(false, Ordering::SeqCst);
    let report = builder.rebuild().unwrap();
    assert_eq!(report.processed, 30);
}

#[test]
fn test_concurrent_rebuild_is_rejected() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let store = TestStore {
        gate: Some((Mutex::new(entered_tx), Mutex::new(release_rx))),
        ..TestStore::default()
    };
    seed(&store, 5);
    let builder = Arc::new(IndexBuilder::new(Arc::new(store)));

    let running = {
        let builder = Arc::clone(&builder);
        thread::spawn(move || builder.rebuild())
    };

    // The first rebuild is now parked inside its scan.
    entered_rx.recv().unwrap();
    assert!(matches!(builder.rebuild(), Err(IndexError::RebuildInProgress)));

    release_tx.send(()).unwrap();
    let report = running.join().unwrap().unwrap();
    assert_eq!(report.processed, 5);
}

#[test]
fn test_zero_scores_excluded_from_ordered_indexes() {
    let store = Arc::new(MemoryStore::new());
    seed(&*store, 10);
    let g = IndexBuilder::new(store.clone()).rebuild().unwrap().generation.unwrap();

    // movie:0000 has rating 0 and budget 0
    for field in [NumericField::Rating, NumericField::Budget] {
        let ranked = store.range_with_scores(&g.numeric_key(field)).unwrap();
        assert_eq!(ranked.len(), 9);
        assert!(ranked.iter().all(|m| m.score > 0.0));
    }
    assert!(store.range_with_scores(&g.numeric_key(NumericField::Popularity)).unwrap().is_empty());
}
