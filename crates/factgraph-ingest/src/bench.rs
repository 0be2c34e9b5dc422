use serde::Serialize;

/// JSON result schema for `<root>/benchmark/{baseline,async}_test_<iso8601>.json`.
/// A benchmark harness (out of scope for this workspace) drives load
/// against the public API and reads this back for its dashboard surface;
/// this crate only implements the recording side.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    pub test_type: String,
    pub timestamp: String,
    pub hardware_info: String,
    pub total_transactions: u64,
    pub successful_transactions: u64,
    pub total_time_ms: f64,
    pub average_tx_time_us: f64,
    pub transactions_per_second: f64,
    pub min_tx_time_us: u64,
    pub max_tx_time_us: u64,
    pub transaction_times: Vec<u64>,
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Percentiles {
    pub min: u64,
    pub p25: u64,
    pub p50: u64,
    pub p75: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub max: u64,
}

/// Records per-submission elapsed-microsecond samples during a benchmark
/// run and renders the [`BenchmarkResult`] schema on `finish`.
pub struct TxTimingRecorder {
    test_type: String,
    hardware_info: String,
    samples: Vec<u64>,
    successful: u64,
}

impl TxTimingRecorder {
    pub fn new(test_type: impl Into<String>, hardware_info: impl Into<String>) -> Self {
        Self {
            test_type: test_type.into(),
            hardware_info: hardware_info.into(),
            samples: Vec::new(),
            successful: 0,
        }
    }

    pub fn record(&mut self, elapsed_us: u64, success: bool) {
        self.samples.push(elapsed_us);
        if success {
            self.successful += 1;
        }
    }

    pub fn finish(mut self, timestamp: impl Into<String>) -> BenchmarkResult {
        self.samples.sort_unstable();
        let total = self.samples.len() as u64;
        let total_time_us: u64 = self.samples.iter().sum();
        let average = if total == 0 { 0.0 } else { total_time_us as f64 / total as f64 };
        let total_time_ms = total_time_us as f64 / 1_000.0;
        let tps = if total_time_ms == 0.0 {
            0.0
        } else {
            total as f64 / (total_time_ms / 1_000.0)
        };

        BenchmarkResult {
            test_type: self.test_type,
            timestamp: timestamp.into(),
            hardware_info: self.hardware_info,
            total_transactions: total,
            successful_transactions: self.successful,
            total_time_ms,
            average_tx_time_us: average,
            transactions_per_second: tps,
            min_tx_time_us: self.samples.first().copied().unwrap_or(0),
            max_tx_time_us: self.samples.last().copied().unwrap_or(0),
            percentiles: percentiles(&self.samples),
            transaction_times: self.samples,
        }
    }
}

/// Nearest-rank percentile over an already-sorted slice.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((p / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

fn percentiles(sorted: &[u64]) -> Percentiles {
    Percentiles {
        min: sorted.first().copied().unwrap_or(0),
        p25: percentile(sorted, 25.0),
        p50: percentile(sorted, 50.0),
        p75: percentile(sorted, 75.0),
        p90: percentile(sorted, 90.0),
        p95: percentile(sorted, 95.0),
        p99: percentile(sorted, 99.0),
        max: sorted.last().copied().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_recorder_has_zeroed_percentiles() {
        let recorder = TxTimingRecorder::new("baseline_test", "test-host");
        let result = recorder.finish("2026-01-01T00:00:00+00:00");
        assert_eq!(result.total_transactions, 0);
        assert_eq!(result.percentiles.max, 0);
    }

    #[test]
    fn records_and_computes_median() {
        let mut recorder = TxTimingRecorder::new("baseline_test", "test-host");
        for us in [100, 200, 300, 400, 500] {
            recorder.record(us, true);
        }
        let result = recorder.finish("2026-01-01T00:00:00+00:00");
        assert_eq!(result.total_transactions, 5);
        assert_eq!(result.successful_transactions, 5);
        assert_eq!(result.min_tx_time_us, 100);
        assert_eq!(result.max_tx_time_us, 500);
        assert_eq!(result.percentiles.p50, 300);
    }

    #[test]
    fn failed_submissions_are_still_timed_but_not_counted_successful() {
        let mut recorder = TxTimingRecorder::new("async_test", "test-host");
        recorder.record(50, true);
        recorder.record(75, false);
        let result = recorder.finish("2026-01-01T00:00:00+00:00");
        assert_eq!(result.total_transactions, 2);
        assert_eq!(result.successful_transactions, 1);
    }
}
