//! Query-side tunables.

/// Configuration shared by [`QueryExecutor`](crate::QueryExecutor) and
/// [`BatchFetcher`](crate::BatchFetcher).
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Keys per `batch_get` round trip; larger candidate sets are split into
    /// chunks fetched in parallel
    pub batch_size: usize,
    /// Key prefix of primary records, for full-scan aggregations
    pub record_prefix: String,
    /// Keys per page when enumerating records or index buckets
    pub scan_page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            record_prefix: "movie:".to_string(),
            scan_page_size: 1000,
        }
    }
}

impl QueryConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_record_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.record_prefix = prefix.into();
        self
    }

    pub fn with_scan_page_size(mut self, page_size: usize) -> Self {
        self.scan_page_size = page_size.max(1);
        self
    }
}
