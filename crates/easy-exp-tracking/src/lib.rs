//! easy-exp-tracking: run-tracking backends for the experiment harness
//!
//! A tracking backend keeps three things per run: the run's configuration,
//! an append-only history of per-step metric rows, and the log artifacts
//! uploaded alongside those rows. The experiment runner writes to it through
//! a [`TrackingSession`] and reads it back through [`RunHistory`] when a run
//! is resumed.
//!
//! ## Key Components
//!
//! - `Tracker`: opens sessions and exposes the history of past runs
//! - `FsTracker`: directory-backed store usable across processes
//! - `fakes::MemoryTracker`: in-memory store for tests

mod error;
pub mod fakes;
pub mod fs_tracker;
pub mod tracking_traits;

pub use error::TrackingError;
pub use fs_tracker::FsTracker;
pub use tracking_traits::{
    artifact_path, is_private_field, HistoryRow, RunHistory, RunId, RunMetadata, RunRecord, RunRef,
    RunStatus, TrackedFile, Tracker, TrackingResult, TrackingSession, PRIVATE_FIELD_PREFIX,
};
