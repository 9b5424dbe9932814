//! Run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Local log directory, recreated at every session open.
pub const LOG_DIR_NAME: &str = "exp_log";

/// Append-only error log.
pub const ERROR_LOG_NAME: &str = "error.log";

/// Per-step capture file, overwritten for every freshly computed step.
pub const CAPTURE_FILE_NAME: &str = "temp.log";

/// Tracked config field holding the digest of the dataset a run evaluated.
pub const DATASET_DIGEST_FIELD: &str = "_dataset_digest";

/// Immutable configuration of one experiment run.
///
/// Built once before [`crate::RunController::open`]; the controller only
/// hands out shared references afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Tracking project.
    pub project: String,

    /// Human-readable run name.
    pub name: String,

    /// Arbitrary key/value configuration recorded with the run.
    pub config: Map<String, Value>,

    /// Open a tracking session for this run.
    pub tracking: bool,

    /// Run id of an earlier run in the same account/project to resume from.
    pub restore_from: Option<String>,

    /// Capture step output into the per-step log file. When false, step
    /// output goes straight to the console.
    pub capture_output: bool,

    /// Directory holding `exp_log/`, `error.log` and `temp.log`.
    pub workdir: PathBuf,

    /// Digest of the dataset this run evaluates, recorded with the run so a
    /// later restore can detect a changed dataset.
    pub dataset_digest: Option<String>,
}

impl RunConfig {
    /// Create a config with tracking enabled, output capture on and the
    /// current directory as working directory.
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            config: Map::new(),
            tracking: true,
            restore_from: None,
            capture_output: true,
            workdir: PathBuf::from("."),
            dataset_digest: None,
        }
    }

    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    pub fn with_tracking(mut self, tracking: bool) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn with_restore_from(mut self, run_id: impl Into<String>) -> Self {
        self.restore_from = Some(run_id.into());
        self
    }

    pub fn with_capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn with_dataset_digest(mut self, digest: impl Into<String>) -> Self {
        self.dataset_digest = Some(digest.into());
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn log_dir(&self) -> PathBuf {
        self.workdir.join(LOG_DIR_NAME)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.workdir.join(ERROR_LOG_NAME)
    }

    pub fn capture_path(&self) -> PathBuf {
        self.workdir.join(CAPTURE_FILE_NAME)
    }

    /// Configuration as recorded by the tracking backend.
    pub fn tracked_config(&self) -> Map<String, Value> {
        let mut config = self.config.clone();
        if let Some(digest) = &self.dataset_digest {
            config.insert(DATASET_DIGEST_FIELD.to_string(), Value::from(digest.as_str()));
        }
        config
    }
}
