//! Batch fetching of primary records.
//!
//! An index lookup yields K candidate keys; fetching them one `get` at a time
//! costs K round trips. [`BatchFetcher`] issues one `batch_get` per chunk of
//! `batch_size` keys, with chunks fetched in parallel.

use crate::error::Result;
use indexer::parser;
use indexer::{Movie, RecordKey};
use rayon::prelude::*;
use record_store::RecordStore;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Retrieves and parses many records at once.
///
/// Absent keys and payloads that fail to parse are silently omitted.
pub struct BatchFetcher<S: RecordStore> {
    store: Arc<S>,
    batch_size: usize,
}

impl<S: RecordStore> Clone for BatchFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            batch_size: self.batch_size,
        }
    }
}

impl<S: RecordStore> BatchFetcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            batch_size: 500,
        }
    }

    /// Configure keys per round trip (default: 500)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Fetch and parse `keys`.
    ///
    /// # Arguments
    /// * `keys` - Primary record keys, typically the members of an index bucket
    ///
    /// # Returns
    /// The parsed records, ordered by record key rather than input order.
    /// Absent keys and unparseable payloads are left out, so the result may
    /// be shorter than `keys`.
    ///
    /// ## Algorithm
    /// 1. Split `keys` into chunks of `batch_size`
    /// 2. Issue one `batch_get` per chunk, chunks in parallel (Rayon)
    /// 3. Parse each payload, dropping the ones that fail
    /// 4. Sort the union by key
    #[instrument(skip_all, fields(keys = keys.len()))]
    pub fn fetch(&self, keys: &[RecordKey]) -> Result<Vec<Movie>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut movies = if keys.len() <= self.batch_size {
            self.fetch_chunk(keys)?
        } else {
            let chunks: Vec<Vec<Movie>> = keys
                .par_chunks(self.batch_size)
                .map(|chunk| self.fetch_chunk(chunk))
                .collect::<Result<_>>()?;
            chunks.into_iter().flatten().collect()
        };

        movies.sort_by(|a, b| a.key.cmp(&b.key));
        debug!("Fetched {} of {} records", movies.len(), keys.len());
        Ok(movies)
    }

    fn fetch_chunk(&self, keys: &[RecordKey]) -> Result<Vec<Movie>> {
        let payloads = self.store.batch_get(keys)?;
        Ok(payloads
            .into_iter()
            .filter_map(|(key, bytes)| match parser::parse_record(&key, &bytes) {
                Ok(movie) => Some(movie),
                Err(e) => {
                    debug!("Omitting {} from batch: {}", key, e);
                    None
                }
            })
            .collect())
    }
}
