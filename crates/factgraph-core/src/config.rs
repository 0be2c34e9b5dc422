use std::path::PathBuf;

use crate::constants::{
    DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_PRUNE_THRESHOLD, DEFAULT_CACHE_TTL_SECONDS,
    DEFAULT_PERFORMANCE_WINDOW, DEFAULT_QUEUE_BATCH_SIZE, DEFAULT_QUEUE_INTERVAL_MS,
};

/// Every tunable the storage, consensus, and ingest layers need, gathered
/// into one struct. Loading this from a file or environment is outside the
/// core's scope — callers construct it directly via
/// [`FactGraphConfig::new`] and adjust fields afterward.
#[derive(Clone, Debug)]
pub struct FactGraphConfig {
    /// Durable mirror root directory.
    pub db_path: PathBuf,
    /// Directory containing one `<validator-id>.pub` file per validator.
    pub validators_dir: PathBuf,
    /// This process's label.
    pub node_id: String,
    pub cache_ttl_seconds: u64,
    pub cache_max_size: usize,
    pub cache_prune_threshold: usize,
    pub performance_window: usize,
    pub queue_batch_size: usize,
    pub queue_interval_ms: u64,
}

impl FactGraphConfig {
    pub fn new(node_id: impl Into<String>, db_path: PathBuf, validators_dir: PathBuf) -> Self {
        Self {
            db_path,
            validators_dir,
            node_id: node_id.into(),
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            cache_max_size: DEFAULT_CACHE_MAX_SIZE,
            cache_prune_threshold: DEFAULT_CACHE_PRUNE_THRESHOLD,
            performance_window: DEFAULT_PERFORMANCE_WINDOW,
            queue_batch_size: DEFAULT_QUEUE_BATCH_SIZE,
            queue_interval_ms: DEFAULT_QUEUE_INTERVAL_MS,
        }
    }
}
