//! Read-only queries over the published index generation.
//!
//! Every public query resolves the `idx:current` pointer exactly once and
//! reads only keys of that generation, so a rebuild publishing concurrently
//! is never observed half-way. Once its reads are done, a query checks that
//! the generation is still registered; if garbage collection removed it in
//! the meantime the query fails with [`QueryError::SnapshotExpired`] instead
//! of returning what may be a partial result.

use crate::config::QueryConfig;
use crate::error::{QueryError, Result};
use crate::fetch::BatchFetcher;
use indexer::keys::{self, Generation};
use indexer::{CategoricalAttribute, Movie, NumericField, RecordKey};
use record_store::{RecordStore, ScoredMember};
use std::sync::Arc;
use tracing::{debug, instrument};

/// One published generation, pinned for the duration of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    generation: Generation,
}

impl Snapshot {
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// Answers lookups, intersections, ranges, rankings and aggregations.
///
/// Holds no state between calls beyond the shared store handle; any number
/// of queries may run concurrently from clones of one executor.
pub struct QueryExecutor<S: RecordStore> {
    pub(crate) store: Arc<S>,
    pub(crate) fetcher: BatchFetcher<S>,
    pub(crate) config: QueryConfig,
}

impl<S: RecordStore> Clone for QueryExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fetcher: self.fetcher.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: RecordStore> QueryExecutor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, QueryConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: QueryConfig) -> Self {
        let fetcher = BatchFetcher::new(Arc::clone(&store)).with_batch_size(config.batch_size);
        Self {
            store,
            fetcher,
            config,
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Resolve the published generation.
    pub fn snapshot(&self) -> Result<Snapshot> {
        keys::current_generation(&*self.store)?
            .map(|generation| Snapshot { generation })
            .ok_or(QueryError::IndexNotBuilt)
    }

    /// Batch-fetch and parse records; absent keys are omitted.
    pub fn fetch(&self, keys: &[RecordKey]) -> Result<Vec<Movie>> {
        self.fetcher.fetch(keys)
    }

    // =========================================================================
    // Categorical
    // =========================================================================

    /// All record keys in the `attr:value` bucket, sorted.
    #[instrument(skip(self))]
    pub fn lookup(&self, attr: CategoricalAttribute, value: &str) -> Result<Vec<RecordKey>> {
        let snapshot = self.snapshot()?;
        self.lookup_in(snapshot, attr, value)
    }

    /// [`lookup`](Self::lookup) with the attribute given by name.
    pub fn lookup_by_name(&self, attr: &str, value: &str) -> Result<Vec<RecordKey>> {
        self.lookup(attr.parse()?, value)
    }

    /// Keys present in every named bucket.
    ///
    /// The intersection happens in the store, before any record is fetched.
    #[instrument(skip(self))]
    pub fn intersect(&self, predicates: &[(CategoricalAttribute, &str)]) -> Result<Vec<RecordKey>> {
        let snapshot = self.snapshot()?;
        self.intersect_in(snapshot, predicates)
    }

    /// Size of the `attr:value` bucket, without fetching records.
    pub fn cardinality(&self, attr: CategoricalAttribute, value: &str) -> Result<usize> {
        let snapshot = self.snapshot()?;
        let key = snapshot.generation.categorical_key(attr, value);
        let count = self.store.set_cardinality(&key)?;
        self.ensure_live(snapshot)?;
        Ok(count)
    }

    // =========================================================================
    // Numeric
    // =========================================================================

    /// Records whose `field` lies in `[min, max]`, by score descending.
    ///
    /// Infinite bounds are accepted; records with a zero or absent value are
    /// never returned since they are not indexed.
    #[instrument(skip(self))]
    pub fn range(&self, field: NumericField, min: f64, max: f64) -> Result<Vec<ScoredMember>> {
        let snapshot = self.snapshot()?;
        self.range_in(snapshot, field, min, max)
    }

    /// Number of records [`range`](Self::range) would return.
    pub fn count_in_range(&self, field: NumericField, min: f64, max: f64) -> Result<usize> {
        Ok(self.range(field, min, max)?.len())
    }

    /// The `k` highest-rated records in `genre`.
    #[instrument(skip(self))]
    pub fn top_in_genre(&self, genre: &str, k: usize) -> Result<Vec<ScoredMember>> {
        let snapshot = self.snapshot()?;
        let key = snapshot.generation.top_rated_key(genre);
        let top = self.store.top_n_descending(&key, k)?;
        self.ensure_live(snapshot)?;
        Ok(top)
    }

    /// The `k` highest-rated records in `genre` that are also in the
    /// `attr:value` bucket.
    ///
    /// Filters the whole genre ranking by bucket membership before
    /// truncating, so lower-ranked matches fill in for non-members.
    #[instrument(skip(self))]
    pub fn top_in_genre_where(
        &self,
        genre: &str,
        attr: CategoricalAttribute,
        value: &str,
        k: usize,
    ) -> Result<Vec<ScoredMember>> {
        let snapshot = self.snapshot()?;
        let generation = snapshot.generation;

        let ranking = self.store.range_with_scores(&generation.top_rated_key(genre))?;
        let bucket = self.store.members_of_set(&generation.categorical_key(attr, value))?;
        self.ensure_live(snapshot)?;

        let mut matched: Vec<ScoredMember> = ranking
            .into_iter()
            .filter(|entry| bucket.contains(&entry.member))
            .collect();
        sort_scored_descending(&mut matched);
        matched.truncate(k);

        debug!("{} of bucket {}:{} ranked in {}", matched.len(), attr, value, genre);
        Ok(matched)
    }

    // =========================================================================
    // Snapshot-pinned primitives
    // =========================================================================

    /// Fails with [`QueryError::SnapshotExpired`] once `snapshot`'s generation
    /// is no longer registered. Call it after the reads it vouches for.
    pub(crate) fn ensure_live(&self, snapshot: Snapshot) -> Result<()> {
        let registered = self
            .store
            .members_of_set(keys::GENERATIONS_KEY)?
            .contains(&snapshot.generation.to_string());
        if registered {
            Ok(())
        } else {
            debug!("Generation {} was collected under a reader", snapshot.generation);
            Err(QueryError::SnapshotExpired(snapshot.generation))
        }
    }

    pub(crate) fn lookup_in(
        &self,
        snapshot: Snapshot,
        attr: CategoricalAttribute,
        value: &str,
    ) -> Result<Vec<RecordKey>> {
        let key = snapshot.generation.categorical_key(attr, value);
        let members = self.store.members_of_set(&key)?;
        self.ensure_live(snapshot)?;
        Ok(members.into_iter().collect())
    }

    pub(crate) fn intersect_in(
        &self,
        snapshot: Snapshot,
        predicates: &[(CategoricalAttribute, &str)],
    ) -> Result<Vec<RecordKey>> {
        if predicates.is_empty() {
            return Err(QueryError::InvalidArgument(
                "intersection needs at least one predicate".to_string(),
            ));
        }
        let index_keys: Vec<String> = predicates
            .iter()
            .map(|(attr, value)| snapshot.generation.categorical_key(*attr, value))
            .collect();
        let members = self.store.intersect_sets(&index_keys)?;
        self.ensure_live(snapshot)?;
        Ok(members.into_iter().collect())
    }

    pub(crate) fn range_in(
        &self,
        snapshot: Snapshot,
        field: NumericField,
        min: f64,
        max: f64,
    ) -> Result<Vec<ScoredMember>> {
        if min.is_nan() || max.is_nan() {
            return Err(QueryError::InvalidArgument(format!(
                "range bounds for {} must be numbers",
                field
            )));
        }
        if min > max {
            return Ok(Vec::new());
        }
        let key = snapshot.generation.numeric_key(field);
        let hits = self.store.range_by_score_descending(&key, min, max)?;
        self.ensure_live(snapshot)?;
        Ok(hits)
    }
}

/// Score descending, then member ascending so equal scores order the same
/// way on every call.
pub(crate) fn sort_scored_descending(entries: &mut [ScoredMember]) {
    entries.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.member.cmp(&b.member))
    });
}

/// Sort fetched records by `key` descending, breaking ties by record key.
pub(crate) fn sort_movies_descending<K>(movies: &mut [Movie], key: K)
where
    K: Fn(&Movie) -> f64,
{
    movies.sort_by(|a, b| {
        key(b)
            .total_cmp(&key(a))
            .then_with(|| a.key.cmp(&b.key))
    });
}
