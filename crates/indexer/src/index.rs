//! Secondary index rebuild.
//!
//! A rebuild derives every inverted and ordered index from one scan of the
//! primary records and publishes the result as a new generation:
//!
//! 1. Allocate the next generation and clear any stale keys under its prefix
//! 2. Scan primary records page by page, up to `max_records`
//! 3. Extract attributes for each page in parallel (Rayon)
//! 4. Write set / ordered-set memberships under the new generation
//! 5. Move the `idx:current` pointer to the new generation
//! 6. Garbage-collect generations beyond the retention window
//!
//! Readers keep serving the previous generation until step 5, so they never
//! observe a partially built index. A store failure before step 5 discards
//! the partial generation and leaves the published one untouched.

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::keys::{
    self, Generation, CURRENT_GENERATION_KEY, GENERATIONS_KEY, NUMERIC_NAMESPACE,
    TOP_RATED_NAMESPACE,
};
use crate::parser;
use crate::types::{CategoricalAttribute, Movie, NumericField};
use rayon::prelude::*;
use record_store::RecordStore;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Summary of a completed rebuild.
#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    pub generation: Option<Generation>,
    /// Records indexed
    pub processed: usize,
    /// Records skipped because their payload could not be parsed
    pub skipped: usize,
    /// Distinct index keys written, per namespace (`genre`, `zset:budget`, ...)
    pub namespace_keys: BTreeMap<String, usize>,
    /// Memberships written, per namespace
    pub namespace_entries: BTreeMap<String, usize>,
    /// Old generations removed after publishing
    pub collected: Vec<Generation>,
    pub elapsed: Duration,
}

/// Tracks which index keys a rebuild touched, for the report.
#[derive(Default)]
struct KeyTally {
    keys: HashMap<String, HashSet<String>>,
    entries: HashMap<String, usize>,
}

impl KeyTally {
    fn record(&mut self, namespace: &str, key: String) {
        *self.entries.entry(namespace.to_string()).or_insert(0) += 1;
        self.keys.entry(namespace.to_string()).or_default().insert(key);
    }

    fn fill(self, report: &mut RebuildReport) {
        report.namespace_keys = self
            .keys
            .into_iter()
            .map(|(namespace, keys)| (namespace, keys.len()))
            .collect();
        report.namespace_entries = self.entries.into_iter().collect();
    }
}

/// Builds and publishes index generations over a record store.
///
/// The store handle is passed in explicitly; a builder owns no global state.
/// Only one rebuild may run per builder at a time.
pub struct IndexBuilder<S: RecordStore> {
    store: Arc<S>,
    config: IndexConfig,
    rebuild_lock: Mutex<()>,
}

impl<S: RecordStore> IndexBuilder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: IndexConfig::default(),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn with_config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Rebuild every managed index from a fresh scan and publish it.
    ///
    /// # Returns
    /// A [`RebuildReport`] naming the published generation, the processed and
    /// skipped record counts, per-namespace key and membership counts, and
    /// the generations collected afterwards.
    ///
    /// ## Algorithm
    /// 1. Take the rebuild lock without waiting
    /// 2. Allocate and register a generation above every known one
    /// 3. Scan, parse and index records into that generation only
    /// 4. On failure, discard the partial generation and return the error
    /// 5. Move `idx:current` to the new generation
    /// 6. Collect generations beyond `retained_generations`
    ///
    /// Fails fast with [`IndexError::RebuildInProgress`] if another rebuild
    /// holds this builder. A garbage collection failure is logged, not
    /// returned, since the new generation is already live.
    #[instrument(skip(self), fields(max_records = self.config.max_records))]
    pub fn rebuild(&self) -> Result<RebuildReport> {
        let _guard = match self.rebuild_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(IndexError::RebuildInProgress),
            // A panicked rebuild left nothing published; the lock itself is still usable.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let start = Instant::now();

        let previous = keys::current_generation(&*self.store)?;
        let generation = self.allocate_generation(previous)?;
        info!(
            "Rebuilding indexes into generation {} (published: {:?})",
            generation, previous
        );

        let mut report = RebuildReport {
            generation: Some(generation),
            ..RebuildReport::default()
        };

        if let Err(e) = self.build_generation(generation, &mut report) {
            warn!("Rebuild of generation {} failed: {}", generation, e);
            if let Err(cleanup) = self.discard(generation) {
                warn!("Could not discard partial generation {}: {}", generation, cleanup);
            }
            return Err(e);
        }

        self.publish(generation)?;

        // The new generation is live; failing to collect old ones only costs space.
        match self.collect_garbage(generation) {
            Ok(collected) => report.collected = collected,
            Err(e) => warn!("Garbage collection after generation {} failed: {}", generation, e),
        }

        report.elapsed = start.elapsed();
        info!(
            "Generation {} published: {} records indexed, {} skipped in {:?}",
            generation, report.processed, report.skipped, report.elapsed
        );
        Ok(report)
    }

    /// Pick a generation number above every one the store knows of, and
    /// register it so a crashed build can still be collected later.
    fn allocate_generation(&self, previous: Option<Generation>) -> Result<Generation> {
        let highest = keys::known_generations(&*self.store)?
            .into_iter()
            .chain(previous)
            .max();
        let generation = highest.map_or(Generation::FIRST, Generation::next);

        let stale = self.store.delete_keys_by_prefix(&generation.prefix())?;
        if stale > 0 {
            warn!("Cleared {} stale keys under generation {}", stale, generation);
        }
        self.store.add_to_set(GENERATIONS_KEY, &generation.to_string())?;
        Ok(generation)
    }

    /// Scan primary records and write this generation's index keys.
    fn build_generation(&self, generation: Generation, report: &mut RebuildReport) -> Result<()> {
        let mut tally = KeyTally::default();
        let mut token: Option<String> = None;

        'scan: loop {
            let page = self.store.scan_keys_by_prefix(
                &self.config.record_prefix,
                token.as_deref(),
                self.config.page_size,
            )?;
            let payloads = self.store.batch_get(&page.keys)?;

            // Extraction is pure, so a page is parsed in parallel. Collecting
            // keeps scan order, which keeps the record cap deterministic.
            let parsed: Vec<(&String, Result<Movie>)> = page
                .keys
                .par_iter()
                .filter_map(|key| {
                    payloads
                        .get(key)
                        .map(|bytes| (key, parser::parse_record(key, bytes)))
                })
                .collect();

            for (key, movie) in parsed {
                if report.processed >= self.config.max_records {
                    break 'scan;
                }
                match movie {
                    Ok(movie) => {
                        self.index_movie(generation, &movie, &mut tally)?;
                        report.processed += 1;
                        if report.processed % 1000 == 0 {
                            debug!("Processed {} movies...", report.processed);
                        }
                    }
                    Err(e) => {
                        warn!("Skipping record {}: {}", key, e);
                        report.skipped += 1;
                    }
                }
            }

            token = page.next;
            if token.is_none() || report.processed >= self.config.max_records {
                break;
            }
        }

        tally.fill(report);
        Ok(())
    }

    /// Add one movie to every index its attributes imply.
    ///
    /// Zero or missing numeric values are "unknown" and stay out of the
    /// ordered indexes.
    fn index_movie(&self, generation: Generation, movie: &Movie, tally: &mut KeyTally) -> Result<()> {
        for attr in CategoricalAttribute::ALL {
            for value in movie.categorical_values(attr) {
                let key = generation.categorical_key(attr, &value);
                self.store.add_to_set(&key, &movie.key)?;
                tally.record(attr.namespace(), key);
            }
        }

        for field in NumericField::ALL {
            let score = movie.numeric(field);
            if score > 0.0 {
                let key = generation.numeric_key(field);
                self.store.add_to_ordered_set(&key, &movie.key, score)?;
                tally.record(&format!("{}:{}", NUMERIC_NAMESPACE, field.name()), key);
            }
        }

        let rating = movie.numbers.rating;
        if rating > 0.0 {
            for genre in &movie.genres {
                let key = generation.top_rated_key(genre);
                self.store.add_to_ordered_set(&key, &movie.key, rating)?;
                tally.record(TOP_RATED_NAMESPACE, key);
            }
        }
        Ok(())
    }

    /// Atomically repoint readers at `generation`.
    fn publish(&self, generation: Generation) -> Result<()> {
        self.store
            .put(CURRENT_GENERATION_KEY, generation.to_string().into_bytes())?;
        info!("Published index generation {}", generation);
        Ok(())
    }

    /// Drop generations older than the retention window behind `published`.
    fn collect_garbage(&self, published: Generation) -> Result<Vec<Generation>> {
        let mut older: Vec<Generation> = keys::known_generations(&*self.store)?
            .into_iter()
            .filter(|g| *g < published)
            .collect();
        // Newest first; keep the first `retained_generations`.
        older.sort_by(|a, b| b.cmp(a));
        let doomed: Vec<Generation> = older
            .into_iter()
            .skip(self.config.retained_generations)
            .collect();

        for generation in &doomed {
            self.discard(*generation)?;
        }
        if !doomed.is_empty() {
            debug!("Collected generations {:?}", doomed);
        }
        Ok(doomed)
    }

    /// Unregister `generation`, then delete its keys. Readers see it as
    /// expired before any of its keys disappear.
    fn discard(&self, generation: Generation) -> Result<()> {
        self.store
            .remove_from_set(GENERATIONS_KEY, &generation.to_string())?;
        let removed = self.store.delete_keys_by_prefix(&generation.prefix())?;
        debug!("Discarded generation {} ({} keys)", generation, removed);
        Ok(())
    }
}
