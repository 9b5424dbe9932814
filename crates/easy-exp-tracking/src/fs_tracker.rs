//! Directory-backed tracking store.
//!
//! Layout: `<root>/<account>/<project>/<run_id>/`
//! - `run.json`: the [`RunRecord`], rewritten atomically on status changes
//! - `history.jsonl`: one logged row per line, in logging order
//! - `files/<name>`: uploaded artifacts
//!
//! Filesystem calls are blocking; the harness drives one step at a time.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::TrackingError;
use crate::tracking_traits::*;

const RUN_FILE: &str = "run.json";
const HISTORY_FILE: &str = "history.jsonl";
const FILES_DIR: &str = "files";

/// Filesystem tracker rooted at a directory shared by all runs.
#[derive(Debug, Clone)]
pub struct FsTracker {
    root: PathBuf,
    account: String,
}

impl FsTracker {
    /// Create a tracker rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>, account: impl Into<String>) -> TrackingResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            account: account.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, account: &str, project: &str) -> TrackingResult<PathBuf> {
        Ok(self
            .root
            .join(segment("account", account)?)
            .join(segment("project", project)?))
    }

    fn run_dir(&self, run: &RunRef) -> TrackingResult<PathBuf> {
        Ok(self
            .project_dir(&run.account, &run.project)?
            .join(segment("run id", run.run_id.as_str())?))
    }

    fn existing_run_dir(&self, run: &RunRef) -> TrackingResult<PathBuf> {
        let dir = self.run_dir(run)?;
        if !dir.join(RUN_FILE).is_file() {
            return Err(TrackingError::RunNotFound {
                run: run.to_string(),
            });
        }
        Ok(dir)
    }
}

/// A directory name under the root: exactly one normal component.
fn segment<'a>(kind: &'static str, value: &'a str) -> TrackingResult<&'a str> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(value),
        _ => Err(TrackingError::InvalidRunSegment {
            kind,
            value: value.to_string(),
        }),
    }
}

fn write_record(dir: &Path, record: &RunRecord) -> TrackingResult<()> {
    let json = serde_json::to_vec_pretty(record)?;
    // Atomic write: temp file in the same directory, then rename.
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.persist(dir.join(RUN_FILE)).map_err(|e| e.error)?;
    Ok(())
}

fn read_record(dir: &Path) -> TrackingResult<RunRecord> {
    let bytes = fs::read(dir.join(RUN_FILE))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn read_history(path: &Path) -> TrackingResult<Vec<HistoryRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: HistoryRow =
            serde_json::from_str(&line).map_err(|e| TrackingError::CorruptHistory {
                path: path.display().to_string(),
                line: idx + 1,
                message: e.to_string(),
            })?;
        rows.push(row);
    }
    Ok(rows)
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<TrackedFile>) -> TrackingResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(base, &path, out)?;
        } else if file_type.is_file() {
            let rel = path.strip_prefix(base).unwrap_or(&path);
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(TrackedFile {
                name,
                size: entry.metadata()?.len(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl RunHistory for FsTracker {
    async fn get_run(&self, run: &RunRef) -> TrackingResult<RunRecord> {
        let dir = self.existing_run_dir(run)?;
        read_record(&dir)
    }

    async fn history(&self, run: &RunRef) -> TrackingResult<Vec<HistoryRow>> {
        let dir = self.existing_run_dir(run)?;
        read_history(&dir.join(HISTORY_FILE))
    }

    async fn files(&self, run: &RunRef) -> TrackingResult<Vec<TrackedFile>> {
        let dir = self.existing_run_dir(run)?;
        let files_dir = dir.join(FILES_DIR);
        let mut files = Vec::new();
        if files_dir.is_dir() {
            collect_files(&files_dir, &files_dir, &mut files)?;
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn download(
        &self,
        run: &RunRef,
        name: &str,
        dest_root: &Path,
    ) -> TrackingResult<PathBuf> {
        let rel = artifact_path(name)?;
        let source = self.existing_run_dir(run)?.join(FILES_DIR).join(&rel);
        if !source.is_file() {
            return Err(TrackingError::ArtifactNotFound {
                run: run.to_string(),
                name: name.to_string(),
            });
        }
        let dest = dest_root.join(&rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &dest)?;
        debug!(run = %run, name = %name, "downloaded artifact");
        Ok(dest)
    }

    async fn list_runs(&self, account: &str, project: &str) -> TrackingResult<Vec<RunRecord>> {
        let dir = self.project_dir(account, project)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.join(RUN_FILE).is_file() {
                records.push(read_record(&path)?);
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

#[async_trait]
impl Tracker for FsTracker {
    fn account(&self) -> &str {
        &self.account
    }

    async fn init(&self, metadata: RunMetadata) -> TrackingResult<Box<dyn TrackingSession>> {
        let (run, dir) = loop {
            let run = RunRef::new(self.account.clone(), metadata.project.clone(), RunId::new());
            let dir = self.run_dir(&run)?;
            if !dir.exists() {
                break (run, dir);
            }
        };
        fs::create_dir_all(dir.join(FILES_DIR))?;
        let record = RunRecord {
            run: run.clone(),
            metadata,
            status: RunStatus::Running,
            created_at: Utc::now(),
            finished_at: None,
        };
        write_record(&dir, &record)?;
        debug!(run = %run, "opened tracking session");
        Ok(Box::new(FsSession {
            run,
            dir,
            next_step: 0,
            status: RunStatus::Running,
        }))
    }
}

struct FsSession {
    run: RunRef,
    dir: PathBuf,
    next_step: u64,
    status: RunStatus,
}

impl FsSession {
    fn ensure_running(&self) -> TrackingResult<()> {
        if self.status != RunStatus::Running {
            return Err(TrackingError::InvalidRunState {
                run_id: self.run.run_id.to_string(),
                status: self.status.to_string(),
                expected: RunStatus::Running.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TrackingSession for FsSession {
    fn run(&self) -> &RunRef {
        &self.run
    }

    async fn log(&mut self, row: &HistoryRow) -> TrackingResult<()> {
        self.ensure_running()?;
        let stamped = stamp_row(row, self.next_step, Utc::now());
        let mut line = serde_json::to_string(&stamped)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(HISTORY_FILE))?;
        file.write_all(line.as_bytes())?;
        self.next_step += 1;
        Ok(())
    }

    async fn save(&mut self, local: &Path, name: &str) -> TrackingResult<()> {
        self.ensure_running()?;
        let dest = self.dir.join(FILES_DIR).join(artifact_path(name)?);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(local, &dest)?;
        Ok(())
    }

    async fn finish(&mut self, status: RunStatus) -> TrackingResult<()> {
        self.ensure_running()?;
        let mut record = read_record(&self.dir)?;
        record.status = status;
        record.finished_at = Some(Utc::now());
        write_record(&self.dir, &record)?;
        self.status = status;
        Ok(())
    }
}
