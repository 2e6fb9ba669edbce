use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    files_processed: AtomicU64,
    files_failed: AtomicU64,
    chunks_summarized: AtomicU64,
    model_calls: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file that reached `PROCESSED` along with its map/reduce footprint.
    pub fn record_processed(&self, chunk_count: u64, model_calls: u64) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.chunks_summarized
            .fetch_add(chunk_count, Ordering::Relaxed);
        self.model_calls.fetch_add(model_calls, Ordering::Relaxed);
    }

    /// Record a unit of work that aborted and left its file `PENDING`.
    pub fn record_failure(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            chunks_summarized: self.chunks_summarized.load(Ordering::Relaxed),
            model_calls: self.model_calls.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Files that completed the pipeline since startup.
    pub files_processed: u64,
    /// Units of work that aborted with an error.
    pub files_failed: u64,
    /// Chunks sent through the map phase for processed files.
    pub chunks_summarized: u64,
    /// Model requests issued for processed files (map plus reduce).
    pub model_calls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_processed_files_and_calls() {
        let metrics = PipelineMetrics::new();
        metrics.record_processed(3, 4);
        metrics.record_processed(1, 2);
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_processed, 2);
        assert_eq!(snapshot.chunks_summarized, 4);
        assert_eq!(snapshot.model_calls, 6);
        assert_eq!(snapshot.files_failed, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        let snapshot = PipelineMetrics::new().snapshot();
        assert_eq!(snapshot.files_processed, 0);
        assert_eq!(snapshot.model_calls, 0);
    }
}
