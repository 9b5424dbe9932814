//! Result recorder: persists one step's results locally and mirrors them to
//! the tracking session.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use easy_exp_tracking::TrackingSession;

use crate::domain::{ExpError, Result, ResultRecord, LOG_DIR_NAME};

/// Where a step's `log_path` lands locally and under which name it is
/// uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    /// Absolute (or workdir-relative) file path under the log directory.
    pub local: PathBuf,
    /// Artifact name, `exp_log/<relative path>` with `/` separators.
    pub artifact: String,
}

/// Resolve a record's `log_path` against `log_dir`.
///
/// The path is normalised lexically and must stay inside the log directory.
pub fn resolve_log_target(log_dir: &Path, log_path: &str) -> Result<LogTarget> {
    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(log_path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(ExpError::InvalidRecord(format!(
                        "log_path {log_path:?} escapes {LOG_DIR_NAME}"
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ExpError::InvalidRecord(format!(
                    "log_path {log_path:?} must be relative"
                )));
            }
        }
    }
    if parts.is_empty() {
        return Err(ExpError::InvalidRecord(format!(
            "log_path {log_path:?} names no file"
        )));
    }

    let local = parts.iter().fold(log_dir.to_path_buf(), |acc, p| acc.join(p));
    let artifact = format!("{LOG_DIR_NAME}/{}", parts.join("/"));
    Ok(LogTarget { local, artifact })
}

/// Moves `from` to `to`, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

/// Records step results.
///
/// Usage:
/// 1. The controller builds one recorder per session.
/// 2. [`ResultRecorder::record`] is called once per step that produced
///    results, fresh or restored.
#[derive(Debug, Clone)]
pub struct ResultRecorder {
    log_dir: PathBuf,
    capture_path: PathBuf,
}

impl ResultRecorder {
    pub fn new(log_dir: impl Into<PathBuf>, capture_path: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            capture_path: capture_path.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Persist `results`.
    ///
    /// For fresh steps with a `log_path`, the capture file is moved to the
    /// resolved path; a failed move is reported and recording continues.
    /// The full record is then logged to the session, and the log file is
    /// uploaded when it exists.
    pub async fn record(
        &self,
        results: &ResultRecord,
        restore_flag: bool,
        item_key: Option<&str>,
        session: Option<&mut Box<dyn TrackingSession>>,
    ) -> Result<Option<LogTarget>> {
        let target = match results.log_path().map_err(ExpError::InvalidRecord)? {
            Some(log_path) => Some(resolve_log_target(&self.log_dir, log_path)?),
            None => None,
        };

        if let (Some(target), false) = (&target, restore_flag) {
            if let Some(parent) = target.local.parent() {
                fs::create_dir_all(parent)?;
            }
            if self.capture_path.exists() {
                if let Err(err) = move_file(&self.capture_path, &target.local) {
                    println!("Failed to move log file: {err}");
                    crate::obs::emit_log_move_failed(&target.artifact, &err);
                }
            }
        }

        if let Some(session) = session {
            session.log(&results.to_history_row(item_key)).await?;
            if let Some(target) = &target {
                if target.local.exists() {
                    session.save(&target.local, &target.artifact).await?;
                }
            }
        }

        Ok(target)
    }
}
