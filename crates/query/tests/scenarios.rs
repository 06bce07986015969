//! Query scenario tests.
//!
//! Each test loads a handful of records, rebuilds the index, and checks a
//! query shape end to end:
//! - Bucket membership, scoped rankings and numeric ranges
//! - Year parsing failures only affect the year index
//! - Order-insensitive genre combinations with minimum support
//! - Scoped top-K with a second categorical predicate
//! - Readers never observe a partially built index or a collected one

use indexer::{CategoricalAttribute, IndexBuilder, IndexConfig, NumericField};
use query::{QueryError, QueryExecutor};
use record_store::{MemoryStore, RecordStore, ScoredMember};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

// =============================================================================
// Helper Functions
// =============================================================================

fn load(records: &[Value]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for record in records {
        let id = match &record["id"] {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        store
            .put(&format!("movie:{}", id), serde_json::to_vec(record).unwrap())
            .unwrap();
    }
    store
}

fn build(records: &[Value]) -> QueryExecutor<MemoryStore> {
    let store = load(records);
    IndexBuilder::new(store.clone()).rebuild().unwrap();
    QueryExecutor::new(store)
}

fn members(entries: &[ScoredMember]) -> Vec<&str> {
    entries.iter().map(|e| e.member.as_str()).collect()
}

// =============================================================================
// Index Shape
// =============================================================================

#[test]
fn test_genre_bucket_ranking_and_range() {
    let executor = build(&[
        json!({"id": 1, "title": "One", "genres_list": "['Drama']", "vote_average": 8.0}),
        json!({"id": 2, "title": "Two", "genres_list": "['Drama', 'Action']", "vote_average": 6.0}),
    ]);

    assert_eq!(
        executor.lookup(CategoricalAttribute::Genre, "Drama").unwrap(),
        vec!["movie:1", "movie:2"]
    );
    assert_eq!(
        executor.top_in_genre("Drama", 1).unwrap(),
        vec![ScoredMember::new("movie:1", 8.0)]
    );
    assert_eq!(
        members(&executor.range(NumericField::Rating, 7.0, 10.0).unwrap()),
        vec!["movie:1"]
    );
    assert_eq!(executor.cardinality(CategoricalAttribute::Genre, "Action").unwrap(), 1);
}

#[test]
fn test_invalid_year_only_skips_year_index() {
    let executor = build(&[json!({
        "id": 7,
        "title": "Undated",
        "release_year": "abc",
        "genres_list": "Horror",
        "Star1": "Some Actor",
    })]);

    assert!(executor.movies_per_year().unwrap().is_empty());
    assert_eq!(executor.lookup(CategoricalAttribute::Genre, "Horror").unwrap(), vec!["movie:7"]);
    assert_eq!(
        executor.lookup(CategoricalAttribute::Actor, "Some Actor").unwrap(),
        vec!["movie:7"]
    );
}

#[test]
fn test_range_excludes_zero_even_when_in_bounds() {
    let executor = build(&[
        json!({"id": 1, "title": "Free", "budget": 0}),
        json!({"id": 2, "title": "Unknown"}),
        json!({"id": 3, "title": "Cheap", "budget": 500}),
    ]);

    let hits = executor.range(NumericField::Budget, 0.0, 1_000.0).unwrap();
    assert_eq!(members(&hits), vec!["movie:3"]);
    assert_eq!(executor.count_in_range(NumericField::Budget, f64::NEG_INFINITY, f64::INFINITY).unwrap(), 1);
}

#[test]
fn test_intersection_is_order_independent() {
    let executor = build(&[
        json!({"id": 1, "title": "A", "Star1": "Lead", "genres_list": "Action"}),
        json!({"id": 2, "title": "B", "Star1": "Lead", "genres_list": "Drama"}),
        json!({"id": 3, "title": "C", "Star1": "Other", "genres_list": "Action"}),
        json!({"id": 4, "title": "D", "Star1": "Lead", "genres_list": "Action, Drama"}),
    ]);

    let forward = executor
        .intersect(&[(CategoricalAttribute::Actor, "Lead"), (CategoricalAttribute::Genre, "Action")])
        .unwrap();
    let backward = executor
        .intersect(&[(CategoricalAttribute::Genre, "Action"), (CategoricalAttribute::Actor, "Lead")])
        .unwrap();

    let expected: BTreeSet<String> = executor
        .lookup(CategoricalAttribute::Actor, "Lead")
        .unwrap()
        .into_iter()
        .filter(|key| {
            executor
                .lookup(CategoricalAttribute::Genre, "Action")
                .unwrap()
                .contains(key)
        })
        .collect();

    assert_eq!(forward, vec!["movie:1", "movie:4"]);
    assert_eq!(forward, backward);
    assert_eq!(forward.into_iter().collect::<BTreeSet<_>>(), expected);
}

// =============================================================================
// Scoped Top-K
// =============================================================================

#[test]
fn test_top_in_genre_filtered_by_year() {
    let executor = build(&[
        json!({"id": "x", "title": "X", "genres_list": "Noir", "vote_average": 9.0, "release_year": 1950}),
        json!({"id": "y", "title": "Y", "genres_list": "Noir", "vote_average": 8.0, "release_year": 1951}),
        json!({"id": "z", "title": "Z", "genres_list": "Noir", "vote_average": 7.0, "release_year": 1950}),
    ]);

    let top = executor
        .top_in_genre_where("Noir", CategoricalAttribute::Year, "1950", 2)
        .unwrap();
    assert_eq!(members(&top), vec!["movie:x", "movie:z"]);
    assert_eq!(top[1].score, 7.0);

    // Unfiltered top-2 would have been [x, y]
    assert_eq!(members(&executor.top_in_genre("Noir", 2).unwrap()), vec!["movie:x", "movie:y"]);
}

// =============================================================================
// Aggregations
// =============================================================================

#[test]
fn test_genre_combinations_are_order_insensitive() {
    let executor = build(&[
        json!({"id": 1, "title": "AB", "genres_list": "['A', 'B']", "vote_average": 6.0}),
        json!({"id": 2, "title": "BA", "genres_list": "['B', 'A']", "vote_average": 8.0}),
        json!({"id": 3, "title": "AC", "genres_list": "['A', 'C']", "vote_average": 5.0}),
        json!({"id": 4, "title": "Solo", "genres_list": "['A']", "vote_average": 9.0}),
    ]);

    let all = executor.genre_combinations(1).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].genres, vec!["A", "B"]);
    assert_eq!(all[0].movie_count, 2);
    assert_eq!(all[0].avg_rating, Some(7.0));
    assert_eq!(all[1].genres, vec!["A", "C"]);
    assert_eq!(all[1].movie_count, 1);

    let supported = executor.genre_combinations(2).unwrap();
    assert_eq!(supported.len(), 1);
    assert_eq!(supported[0].genres, vec!["A", "B"]);
}

#[test]
fn test_movies_per_year_and_trends() {
    let executor = build(&[
        json!({"id": 1, "title": "A", "release_year": 1989, "vote_average": 7.0}),
        json!({"id": 2, "title": "B", "release_year": 1995, "vote_average": 8.0, "budget": 100}),
        json!({"id": 3, "title": "C", "release_year": 1995, "vote_average": 0, "budget": 300}),
        json!({"id": 4, "title": "D", "release_year": 2001.0, "vote_average": 6.0}),
    ]);

    let per_year: Vec<(i32, usize)> = executor
        .movies_per_year()
        .unwrap()
        .into_iter()
        .map(|row| (row.year, row.movie_count))
        .collect();
    assert_eq!(per_year, vec![(2001, 1), (1995, 2), (1989, 1)]);

    let trends = executor.yearly_trends(1990, 7.0).unwrap();
    assert_eq!(trends.len(), 2);
    assert_eq!(trends[0].year, 2001);
    assert_eq!(trends[1].year, 1995);
    assert_eq!(trends[1].movie_count, 2);
    assert_eq!(trends[1].avg_rating, Some(8.0));
    assert_eq!(trends[1].avg_budget, Some(200.0));
    assert_eq!(trends[1].avg_runtime, None);
    assert_eq!(trends[1].high_rated_count, 1);
}

#[test]
fn test_rating_by_genre() {
    let executor = build(&[
        json!({"id": 1, "title": "A", "genres_list": "Drama", "vote_average": 9.0}),
        json!({"id": 2, "title": "B", "genres_list": "Drama", "vote_average": 5.0}),
        json!({"id": 3, "title": "C", "genres_list": "Drama", "vote_average": 0}),
        json!({"id": 4, "title": "D", "genres_list": "Comedy", "vote_average": 8.0}),
        json!({"id": 5, "title": "E", "genres_list": "Silent"}),
    ]);

    let rows = executor.rating_by_genre().unwrap();
    let genres: Vec<&str> = rows.iter().map(|r| r.genre.as_str()).collect();
    assert_eq!(genres, vec!["Comedy", "Drama"]);

    let drama = &rows[1];
    assert_eq!(drama.rated_count, 2);
    assert_eq!(drama.avg_rating, 7.0);
    assert_eq!(drama.min_rating, 5.0);
    assert_eq!(drama.max_rating, 9.0);
}

#[test]
fn test_top_actors_applies_minimum_support() {
    let mut records = Vec::new();
    for i in 0..3 {
        records.push(json!({"id": i, "title": "Lead role", "Star1": "Prolific", "vote_average": 6.0}));
    }
    for i in 3..6 {
        records.push(json!({"id": i, "title": "Lead role", "Star1": "Acclaimed", "vote_average": 8.0}));
    }
    for i in 6..8 {
        records.push(json!({"id": i, "title": "Cameo", "Star1": "Newcomer", "vote_average": 9.5}));
    }
    let executor = build(&records);

    let rows = executor.top_actors(10, 3).unwrap();
    let actors: Vec<&str> = rows.iter().map(|r| r.actor.as_str()).collect();
    // Equal counts fall back to average rating
    assert_eq!(actors, vec!["Acclaimed", "Prolific"]);
    assert_eq!(rows[0].movie_count, 3);

    assert_eq!(executor.top_actors(1, 1).unwrap()[0].actor, "Acclaimed");
}

// =============================================================================
// Consistency
// =============================================================================

#[test]
fn test_queries_before_first_rebuild() {
    let executor = QueryExecutor::new(load(&[json!({"id": 1, "title": "A"})]));
    assert!(matches!(executor.top_in_genre("Drama", 3), Err(QueryError::IndexNotBuilt)));
    assert!(matches!(executor.genre_combinations(1), Ok(ref rows) if rows.is_empty()));
}

/// Readers race ten rebuilds at default retention. Each read either sees the
/// whole bucket or reports that its generation was collected; a short count
/// or an empty `Ok` never happens.
#[test]
fn test_readers_never_see_partial_index() {
    let records: Vec<Value> = (0..200)
        .map(|i| json!({"id": i, "title": format!("Movie {}", i), "genres_list": "Drama"}))
        .collect();
    let store = load(&records);
    let builder = IndexBuilder::new(store.clone())
        .with_config(IndexConfig::default().with_page_size(25));
    builder.rebuild().unwrap();

    let executor = QueryExecutor::new(store);
    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let executor = executor.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut observed = 0;
                loop {
                    // Read once more after the last rebuild finished.
                    let finished = done.load(Ordering::SeqCst);
                    match executor.cardinality(CategoricalAttribute::Genre, "Drama") {
                        Ok(count) => {
                            assert_eq!(count, 200, "reader observed a partial index");
                            observed += 1;
                        }
                        Err(QueryError::SnapshotExpired(_)) => {}
                        Err(e) => panic!("unexpected query error: {e}"),
                    }
                    if finished {
                        break observed;
                    }
                }
            })
        })
        .collect();

    for _ in 0..10 {
        builder.rebuild().unwrap();
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

#[test]
fn test_aggregation_on_collected_generation_is_an_error() {
    let store = load(&[
        json!({"id": 1, "title": "A", "genres_list": "Drama", "vote_average": 7.0, "release_year": 2001}),
    ]);
    IndexBuilder::new(store.clone()).rebuild().unwrap();
    let executor = QueryExecutor::new(store.clone());
    assert_eq!(executor.rating_by_genre().unwrap().len(), 1);

    // Drop every generation from the registry, as a collector would just
    // before deleting its keys.
    for generation in indexer::keys::known_generations(&*store).unwrap() {
        store
            .remove_from_set(indexer::keys::GENERATIONS_KEY, &generation.to_string())
            .unwrap();
    }

    assert!(matches!(executor.rating_by_genre(), Err(QueryError::SnapshotExpired(_))));
    assert!(matches!(executor.movies_per_year(), Err(QueryError::SnapshotExpired(_))));
    assert!(matches!(executor.top_in_genre("Drama", 1), Err(QueryError::SnapshotExpired(_))));
}
