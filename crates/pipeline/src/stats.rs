//! Per-stream flush counters, reported on the health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::flusher::FlushOutcome;

/// Running totals for one stream's flush worker.
#[derive(Debug, Default)]
pub struct FlushStats {
    batches_flushed: AtomicU64,
    rows_written: AtomicU64,
    rows_rejected: AtomicU64,
    batches_failed: AtomicU64,
    rows_dropped: AtomicU64,
}

/// Point-in-time copy of [`FlushStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushStatsSnapshot {
    pub batches_flushed: u64,
    pub rows_written: u64,
    /// Rows filtered out of a committed batch (unknown account, or a
    /// monitor that was already registered).
    pub rows_rejected: u64,
    pub batches_failed: u64,
    /// Rows lost with failed batches.
    pub rows_dropped: u64,
}

impl FlushStats {
    pub fn record_success(&self, outcome: FlushOutcome) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.rows_written.fetch_add(outcome.written, Ordering::Relaxed);
        self.rows_rejected.fetch_add(outcome.rejected, Ordering::Relaxed);
    }

    pub fn record_failure(&self, rows: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.rows_dropped.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FlushStatsSnapshot {
        FlushStatsSnapshot {
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            rows_dropped: self.rows_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = FlushStats::default();
        stats.record_success(FlushOutcome {
            written: 8,
            rejected: 2,
        });
        stats.record_success(FlushOutcome {
            written: 5,
            rejected: 0,
        });
        stats.record_failure(7);

        assert_eq!(
            stats.snapshot(),
            FlushStatsSnapshot {
                batches_flushed: 2,
                rows_written: 13,
                rows_rejected: 2,
                batches_failed: 1,
                rows_dropped: 7,
            }
        );
    }
}
