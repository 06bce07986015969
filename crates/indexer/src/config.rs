//! Rebuild configuration.

/// Tunables for [`IndexBuilder`](crate::IndexBuilder).
///
/// ## Usage
/// ```ignore
/// let config = IndexConfig::default()
///     .with_max_records(20_000)
///     .with_page_size(500);
/// ```
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Stop after this many records were indexed (bounds rebuild cost)
    pub max_records: usize,
    /// Keys requested per scan page
    pub page_size: usize,
    /// Key prefix of primary records
    pub record_prefix: String,
    /// Previous generations kept after a publish, for queries still reading them
    pub retained_generations: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_records: 5000,
            page_size: 1000,
            record_prefix: "movie:".to_string(),
            retained_generations: 1,
        }
    }
}

impl IndexConfig {
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_record_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.record_prefix = prefix.into();
        self
    }

    pub fn with_retained_generations(mut self, retained: usize) -> Self {
        self.retained_generations = retained;
        self
    }
}
