//! Structured observability hooks for the experiment run lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span via [`run_span`]
//! - Emission functions for lifecycle events: open, restore, step recorded,
//!   step failed, cancel, close
//!
//! Events are emitted at `info!` level (`warn!` for failures) and carry an
//! `event` field so JSON output can be filtered on it.

use tracing::{info, warn};

/// Span tagging every event of one run with its name.
///
/// ```ignore
/// runner.drive(...).instrument(run_span("baseline")).await
/// ```
pub fn run_span(run_name: &str) -> tracing::Span {
    tracing::info_span!("easy_exp.run", run_name = %run_name)
}

/// Emit event: session opened.
pub fn emit_run_opened(run_name: &str, tracked_run: Option<&str>, restored_records: usize) {
    info!(
        event = "run.opened",
        run_name = %run_name,
        tracked_run = tracked_run.unwrap_or("-"),
        restored_records = restored_records,
    );
}

/// Emit event: prior results resolved from a tracked run.
pub fn emit_run_restored(source: &str, records: usize, files: usize) {
    info!(event = "run.restored", source = %source, records = records, files = files);
}

/// Emit event: one step's results recorded.
pub fn emit_step_recorded(step: usize, restored: bool, log_file: Option<&str>) {
    info!(
        event = "run.step_recorded",
        step = step,
        restored = restored,
        log_file = log_file.unwrap_or("-"),
    );
}

/// Emit event: a step failed and was skipped (warning level).
pub fn emit_step_failed(step: usize, error: &dyn std::fmt::Display) {
    warn!(event = "run.step_failed", step = step, error = %error);
}

/// Emit event: the run was cancelled while processing `step`.
pub fn emit_run_cancelled(step: usize) {
    warn!(event = "run.cancelled", step = step);
}

/// Emit event: session closed with its terminal status.
pub fn emit_run_closed(run_name: &str, status: &str) {
    info!(event = "run.closed", run_name = %run_name, status = %status);
}

/// Emit event: the capture file could not be promoted to its log path.
pub fn emit_log_move_failed(target: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.log_move_failed", target = %target, error = %error);
}
