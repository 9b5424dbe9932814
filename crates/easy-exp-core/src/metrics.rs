//! Per-run counters.
//!
//! Counters are bumped silently by the run loop. [`RunMetrics::flush`] emits
//! the current values as a single `tracing::info!` event at the end of a run.

use serde::{Deserialize, Serialize};

/// Step counters for one run. Owned by the controller, so no atomics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Steps computed and recorded in this run.
    pub fresh: u64,
    /// Steps replayed from a restored run.
    pub restored: u64,
    /// Steps that failed and were written to the error log.
    pub failed: u64,
    /// Steps that returned no results.
    pub empty: u64,
}

impl RunMetrics {
    pub fn inc_fresh(&mut self) {
        self.fresh += 1;
        tracing::trace!(metric = "fresh", "counter incremented");
    }

    pub fn inc_restored(&mut self) {
        self.restored += 1;
        tracing::trace!(metric = "restored", "counter incremented");
    }

    pub fn inc_failed(&mut self) {
        self.failed += 1;
        tracing::trace!(metric = "failed", "counter incremented");
    }

    pub fn inc_empty(&mut self) {
        self.empty += 1;
        tracing::trace!(metric = "empty", "counter incremented");
    }

    /// Steps that reached the recorder.
    pub fn recorded(&self) -> u64 {
        self.fresh + self.restored
    }

    /// Steps the loop finished handling, whatever the outcome.
    pub fn processed(&self) -> u64 {
        self.fresh + self.restored + self.failed + self.empty
    }

    /// Emit all counter values as one `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            fresh = self.fresh,
            restored = self.restored,
            failed = self.failed,
            empty = self.empty,
        );
    }
}

/// Summary returned by [`crate::RunController::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Items in the dataset.
    pub total: usize,
    pub metrics: RunMetrics,
    /// The loop stopped early on cancellation.
    pub cancelled: bool,
}

impl RunReport {
    pub fn completed(&self) -> bool {
        !self.cancelled && self.metrics.processed() as usize == self.total
    }
}
