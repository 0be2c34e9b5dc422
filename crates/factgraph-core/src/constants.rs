//! ─── Fact-store defaults ─────────────────────────────────────────────────────
//!
//! Every constant here is a *default* — all are overridable via
//! [`crate::config::FactGraphConfig`].

/// Sliding window size for a validator's recent transaction outcomes.
pub const DEFAULT_PERFORMANCE_WINDOW: usize = 100;

/// Query cache: time-to-live in seconds before an entry is considered stale.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Query cache: maximum number of entries before pruning kicks in.
pub const DEFAULT_CACHE_MAX_SIZE: usize = 10_000;

/// Query cache: prune down to half of `cache_max_size` once this many entries
/// are held (default is 80% of `DEFAULT_CACHE_MAX_SIZE`).
pub const DEFAULT_CACHE_PRUNE_THRESHOLD: usize = 8_000;

/// Transaction queue: entries drained per worker tick.
pub const DEFAULT_QUEUE_BATCH_SIZE: usize = 10;

/// Transaction queue: milliseconds between worker ticks.
pub const DEFAULT_QUEUE_INTERVAL_MS: u64 = 100;

/// Auto-label emitted for the edge linking a freshly appended node to its
/// immediate predecessor.
pub const CONFIRMS_EDGE_LABEL: &str = "confirms";
