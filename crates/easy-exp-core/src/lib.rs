//! easy-exp-core: resumable, fault-isolated experiment runs
//!
//! The [`RunController`] walks a [`Dataset`] one item at a time, hands each
//! item to a [`StepExecutor`], and records the resulting [`ResultRecord`]
//! locally under `exp_log/` and in an optional tracking session. A run can
//! resume from an earlier tracked run: items that already have results are
//! replayed through [`Metric::record`] instead of being recomputed.
//!
//! ## Key Components
//!
//! - `domain`: run configuration, result records and errors
//! - `runner`: the per-item control loop and session lifecycle
//! - `restore`: rebuilding prior results from a tracked run
//! - `recording`: persisting one step's results and log file
//! - `obs` / `telemetry` / `metrics`: tracing events, subscriber setup, counters

pub mod capture;
pub mod dataset;
pub mod domain;
pub mod error_log;
pub mod experiment;
pub mod metrics;
pub mod obs;
pub mod recording;
pub mod restore;
pub mod runner;
pub mod telemetry;

pub use capture::StepLog;
pub use dataset::{dataset_digest, Dataset, VecDataset};
pub use domain::{
    ExpError, Result, ResultRecord, RunConfig, StepError, CAPTURE_FILE_NAME, DATASET_DIGEST_FIELD,
    ERROR_LOG_NAME, ITEM_KEY_FIELD, LOG_DIR_NAME, LOG_PATH_KEY,
};
pub use error_log::ErrorLog;
pub use experiment::{Metric, Model, StepExecutor};
pub use metrics::{RunMetrics, RunReport};
pub use recording::{resolve_log_target, LogTarget, ResultRecorder};
pub use restore::{resolve_restore, RestoredResults};
pub use runner::RunController;
pub use telemetry::init_tracing;

pub use tokio_util::sync::CancellationToken;
