//! In-memory fake tracker (testing only)
//!
//! Provides `MemoryTracker`, which satisfies the `Tracker` contract without
//! touching disk or network, and exposes inspection helpers so tests can
//! assert on what a run logged, uploaded and how often it was finished.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::TrackingError;
use crate::tracking_traits::*;

#[derive(Debug)]
struct RunState {
    record: RunRecord,
    rows: Vec<HistoryRow>,
    files: BTreeMap<String, Vec<u8>>,
    finish_calls: usize,
}

#[derive(Debug, Default)]
struct Inner {
    runs: HashMap<String, RunState>,
    unavailable: bool,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(run: &RunRef) -> TrackingError {
    TrackingError::RunNotFound {
        run: run.to_string(),
    }
}

fn check_available(inner: &Inner) -> TrackingResult<()> {
    if inner.unavailable {
        return Err(TrackingError::Unavailable(
            "memory tracker marked unavailable".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MemoryTracker
// ---------------------------------------------------------------------------

/// In-memory tracker. Clones share the same underlying store.
#[derive(Debug, Clone)]
pub struct MemoryTracker {
    account: String,
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::with_account("local")
    }

    pub fn with_account(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Make every subsequent call fail with `TrackingError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.inner).unavailable = unavailable;
    }

    /// Create a finished run with pre-baked history rows and artifacts.
    pub fn seed_run(
        &self,
        project: &str,
        name: &str,
        rows: Vec<HistoryRow>,
        files: Vec<(String, Vec<u8>)>,
    ) -> RunRef {
        let run = RunRef::new(self.account.clone(), project, RunId::new());
        let now = Utc::now();
        let record = RunRecord {
            run: run.clone(),
            metadata: RunMetadata {
                project: project.to_string(),
                name: name.to_string(),
                config: Default::default(),
            },
            status: RunStatus::Finished,
            created_at: now,
            finished_at: Some(now),
        };
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, row)| stamp_row(row, i as u64, now))
            .collect();
        lock(&self.inner).runs.insert(
            run.to_string(),
            RunState {
                record,
                rows,
                files: files.into_iter().collect(),
                finish_calls: 1,
            },
        );
        run
    }

    /// Rows logged to `run`, private fields included.
    pub fn rows(&self, run: &RunRef) -> Vec<HistoryRow> {
        lock(&self.inner)
            .runs
            .get(&run.to_string())
            .map(|s| s.rows.clone())
            .unwrap_or_default()
    }

    /// Contents of an uploaded artifact, if present.
    pub fn file_contents(&self, run: &RunRef, name: &str) -> Option<Vec<u8>> {
        lock(&self.inner)
            .runs
            .get(&run.to_string())
            .and_then(|s| s.files.get(name).cloned())
    }

    /// How many times `finish` was called on the run's session.
    pub fn finish_calls(&self, run: &RunRef) -> usize {
        lock(&self.inner)
            .runs
            .get(&run.to_string())
            .map(|s| s.finish_calls)
            .unwrap_or(0)
    }

    /// Refs of every run opened through `init`, in no particular order.
    pub fn opened_runs(&self) -> Vec<RunRef> {
        lock(&self.inner)
            .runs
            .values()
            .map(|s| s.record.run.clone())
            .collect()
    }
}

#[async_trait]
impl RunHistory for MemoryTracker {
    async fn get_run(&self, run: &RunRef) -> TrackingResult<RunRecord> {
        let inner = lock(&self.inner);
        check_available(&inner)?;
        inner
            .runs
            .get(&run.to_string())
            .map(|s| s.record.clone())
            .ok_or_else(|| not_found(run))
    }

    async fn history(&self, run: &RunRef) -> TrackingResult<Vec<HistoryRow>> {
        let inner = lock(&self.inner);
        check_available(&inner)?;
        inner
            .runs
            .get(&run.to_string())
            .map(|s| s.rows.clone())
            .ok_or_else(|| not_found(run))
    }

    async fn files(&self, run: &RunRef) -> TrackingResult<Vec<TrackedFile>> {
        let inner = lock(&self.inner);
        check_available(&inner)?;
        let state = inner.runs.get(&run.to_string()).ok_or_else(|| not_found(run))?;
        Ok(state
            .files
            .iter()
            .map(|(name, bytes)| TrackedFile {
                name: name.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    async fn download(
        &self,
        run: &RunRef,
        name: &str,
        dest_root: &Path,
    ) -> TrackingResult<PathBuf> {
        let bytes = {
            let inner = lock(&self.inner);
            check_available(&inner)?;
            let state = inner.runs.get(&run.to_string()).ok_or_else(|| not_found(run))?;
            state
                .files
                .get(name)
                .cloned()
                .ok_or_else(|| TrackingError::ArtifactNotFound {
                    run: run.to_string(),
                    name: name.to_string(),
                })?
        };
        let dest = dest_root.join(artifact_path(name)?);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest, bytes)?;
        Ok(dest)
    }

    async fn list_runs(&self, account: &str, project: &str) -> TrackingResult<Vec<RunRecord>> {
        let inner = lock(&self.inner);
        check_available(&inner)?;
        let mut records: Vec<RunRecord> = inner
            .runs
            .values()
            .filter(|s| s.record.run.account == account && s.record.run.project == project)
            .map(|s| s.record.clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}

#[async_trait]
impl Tracker for MemoryTracker {
    fn account(&self) -> &str {
        &self.account
    }

    async fn init(&self, metadata: RunMetadata) -> TrackingResult<Box<dyn TrackingSession>> {
        let run = RunRef::new(self.account.clone(), metadata.project.clone(), RunId::new());
        let record = RunRecord {
            run: run.clone(),
            metadata,
            status: RunStatus::Running,
            created_at: Utc::now(),
            finished_at: None,
        };
        let mut inner = lock(&self.inner);
        check_available(&inner)?;
        inner.runs.insert(
            run.to_string(),
            RunState {
                record,
                rows: Vec::new(),
                files: BTreeMap::new(),
                finish_calls: 0,
            },
        );
        Ok(Box::new(MemorySession {
            run,
            inner: Arc::clone(&self.inner),
        }))
    }
}

// ---------------------------------------------------------------------------
// MemorySession
// ---------------------------------------------------------------------------

struct MemorySession {
    run: RunRef,
    inner: Arc<Mutex<Inner>>,
}

impl MemorySession {
    fn with_running<T>(
        &self,
        f: impl FnOnce(&mut RunState) -> TrackingResult<T>,
    ) -> TrackingResult<T> {
        let mut inner = lock(&self.inner);
        check_available(&inner)?;
        let state = inner
            .runs
            .get_mut(&self.run.to_string())
            .ok_or_else(|| not_found(&self.run))?;
        if state.record.status != RunStatus::Running {
            return Err(TrackingError::InvalidRunState {
                run_id: self.run.run_id.to_string(),
                status: state.record.status.to_string(),
                expected: RunStatus::Running.to_string(),
            });
        }
        f(state)
    }
}

#[async_trait]
impl TrackingSession for MemorySession {
    fn run(&self) -> &RunRef {
        &self.run
    }

    async fn log(&mut self, row: &HistoryRow) -> TrackingResult<()> {
        self.with_running(|state| {
            let step = state.rows.len() as u64;
            state.rows.push(stamp_row(row, step, Utc::now()));
            Ok(())
        })
    }

    async fn save(&mut self, local: &Path, name: &str) -> TrackingResult<()> {
        artifact_path(name)?;
        let bytes = std::fs::read(local)?;
        self.with_running(|state| {
            state.files.insert(name.to_string(), bytes);
            Ok(())
        })
    }

    async fn finish(&mut self, status: RunStatus) -> TrackingResult<()> {
        {
            let mut inner = lock(&self.inner);
            if let Some(state) = inner.runs.get_mut(&self.run.to_string()) {
                state.finish_calls += 1;
            }
        }
        self.with_running(|state| {
            state.record.status = status;
            state.record.finished_at = Some(Utc::now());
            Ok(())
        })
    }
}
