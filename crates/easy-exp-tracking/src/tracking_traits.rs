//! Tracking trait definitions for easy-exp
//!
//! These traits define the run-tracking abstractions:
//! - `TrackingSession`: a live run accepting metric rows and log artifacts
//! - `RunHistory`: read access to runs recorded earlier (used by restore)
//! - `Tracker`: opens sessions and exposes history
//!
//! All traits are async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TrackingError;

/// Result type for tracking operations
pub type TrackingResult<T> = std::result::Result<T, TrackingError>;

/// One logged row of metric history.
pub type HistoryRow = Map<String, Value>;

/// Fields whose name starts with this prefix belong to the backend
/// (`_step`, `_timestamp`, ...) rather than to the logged metrics.
pub const PRIVATE_FIELD_PREFIX: char = '_';

/// Whether `key` names a backend-private history field.
pub fn is_private_field(key: &str) -> bool {
    key.starts_with(PRIVATE_FIELD_PREFIX)
}

// ---------------------------------------------------------------------------
// Run identity
// ---------------------------------------------------------------------------

/// Short identifier for a tracked run (8 lowercase hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random RunId
    pub fn new() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        RunId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully qualified reference to a run: `account/project/run_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunRef {
    pub account: String,
    pub project: String,
    pub run_id: RunId,
}

impl RunRef {
    pub fn new(account: impl Into<String>, project: impl Into<String>, run_id: RunId) -> Self {
        Self {
            account: account.into(),
            project: project.into(),
            run_id,
        }
    }
}

impl fmt::Display for RunRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.account, self.project, self.run_id)
    }
}

// ---------------------------------------------------------------------------
// Run records
// ---------------------------------------------------------------------------

/// Metadata attached to a run when its session is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Project the run belongs to
    pub project: String,
    /// Human-readable run name
    pub name: String,
    /// Arbitrary key-value configuration
    pub config: Map<String, Value>,
}

/// Status of a tracked run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Full run record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run: RunRef,
    pub metadata: RunMetadata,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// An uploaded artifact, named by its path relative to the run's working
/// directory (e.g. `exp_log/true/problem_1.log`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub name: String,
    pub size: u64,
}

/// Validate an artifact name and turn it into a relative path.
///
/// Names use `/` separators and must not escape their root.
pub fn artifact_path(name: &str) -> TrackingResult<PathBuf> {
    let path = Path::new(name);
    if name.is_empty() {
        return Err(TrackingError::InvalidArtifactName(name.to_string()));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(TrackingError::InvalidArtifactName(name.to_string())),
        }
    }
    Ok(path.to_path_buf())
}

/// Copy `row` and add the backend's `_step` / `_timestamp` fields.
pub(crate) fn stamp_row(row: &HistoryRow, step: u64, at: DateTime<Utc>) -> HistoryRow {
    let mut stamped = row.clone();
    stamped.insert("_step".to_string(), Value::from(step));
    stamped.insert(
        "_timestamp".to_string(),
        Value::from(at.timestamp_millis() as f64 / 1000.0),
    );
    stamped
}

// ---------------------------------------------------------------------------
// Sessions and history
// ---------------------------------------------------------------------------

/// A live tracking session.
///
/// Guarantees:
/// - Rows are appended in call order; each gains `_step` and `_timestamp`.
/// - A session transitions Running → Finished | Cancelled exactly once;
///   calls after that fail with `InvalidRunState`.
#[async_trait]
pub trait TrackingSession: Send + Sync {
    /// The run this session writes to.
    fn run(&self) -> &RunRef;

    /// Append one row of metrics to the run history.
    async fn log(&mut self, row: &HistoryRow) -> TrackingResult<()>;

    /// Upload the file at `local` under artifact `name`.
    async fn save(&mut self, local: &Path, name: &str) -> TrackingResult<()>;

    /// Close the session with a terminal status.
    async fn finish(&mut self, status: RunStatus) -> TrackingResult<()>;
}

/// Read access to previously recorded runs.
#[async_trait]
pub trait RunHistory: Send + Sync {
    /// Retrieve a run record.
    async fn get_run(&self, run: &RunRef) -> TrackingResult<RunRecord>;

    /// All logged rows of a run, in logging order, private fields included.
    async fn history(&self, run: &RunRef) -> TrackingResult<Vec<HistoryRow>>;

    /// Artifacts uploaded to a run, sorted by name.
    async fn files(&self, run: &RunRef) -> TrackingResult<Vec<TrackedFile>>;

    /// Download artifact `name` to `dest_root/name`, creating parent dirs.
    async fn download(&self, run: &RunRef, name: &str, dest_root: &Path)
        -> TrackingResult<PathBuf>;

    /// List runs in a project, oldest first.
    async fn list_runs(&self, account: &str, project: &str) -> TrackingResult<Vec<RunRecord>>;
}

/// A tracking backend: opens sessions and serves history.
#[async_trait]
pub trait Tracker: RunHistory {
    /// Account (entity) new sessions are created under.
    fn account(&self) -> &str;

    /// Open a new session for a run.
    async fn init(&self, metadata: RunMetadata) -> TrackingResult<Box<dyn TrackingSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_eight_hex_chars() {
        let id = RunId::new();
        assert_eq!(id.as_str().len(), 8);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn run_ref_display_is_slash_separated() {
        let run = RunRef::new("me", "math", RunId("92xi1igb".to_string()));
        assert_eq!(run.to_string(), "me/math/92xi1igb");
    }

    #[test]
    fn artifact_path_rejects_escapes() {
        assert!(artifact_path("exp_log/true/a.log").is_ok());
        assert!(artifact_path("../secret").is_err());
        assert!(artifact_path("/etc/passwd").is_err());
        assert!(artifact_path("").is_err());
    }

    #[test]
    fn private_fields_use_underscore_prefix() {
        assert!(is_private_field("_step"));
        assert!(is_private_field("_timestamp"));
        assert!(!is_private_field("accuracy"));
    }
}
