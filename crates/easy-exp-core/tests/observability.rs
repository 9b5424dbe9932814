//! Observability tests for the experiment run lifecycle.
//!
//! The emitters must accept every shape of input the controller hands them
//! without panicking while a subscriber is installed.

use easy_exp_core::obs::{
    emit_log_move_failed, emit_run_cancelled, emit_run_closed, emit_run_opened,
    emit_run_restored, emit_step_failed, emit_step_recorded, run_span,
};
use easy_exp_core::RunMetrics;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_run_opened_with_and_without_tracking() {
    emit_run_opened("baseline", Some("92xi1igb"), 0);
    emit_run_opened("baseline", None, 12);
}

#[traced_test]
#[test]
fn test_emit_step_events() {
    emit_step_recorded(0, false, Some("exp_log/true/p1.log"));
    emit_step_recorded(1, true, None);
    emit_step_failed(2, &"judge timed out");
}

#[traced_test]
#[test]
fn test_emit_restore_cancel_close() {
    emit_run_restored("local/math/92xi1igb", 40, 38);
    emit_run_cancelled(41);
    emit_run_closed("baseline", "cancelled");
}

#[traced_test]
#[test]
fn test_emit_log_move_failed() {
    let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    emit_log_move_failed("exp_log/a/b.log", &err);
}

#[traced_test]
#[test]
fn test_events_inside_run_span() {
    let _entered = run_span("baseline").entered();
    emit_step_recorded(0, false, None);
    RunMetrics::default().flush();
}
