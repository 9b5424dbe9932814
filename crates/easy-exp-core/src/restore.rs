//! Restore source resolution.
//!
//! Rebuilds the result records of an earlier run from its tracked history
//! and downloads the log artifacts it uploaded under `exp_log/`.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use easy_exp_tracking::{RunHistory, RunRef, TrackingError};

use crate::domain::{
    ExpError, Result, ResultRecord, DATASET_DIGEST_FIELD, ITEM_KEY_FIELD, LOG_DIR_NAME,
};

/// Results of an earlier run, in the order they were logged.
///
/// When the earlier run recorded item keys, lookups go by key; otherwise
/// record `i` belongs to dataset item `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredResults {
    source: RunRef,
    records: Vec<ResultRecord>,
    keys: Vec<Option<String>>,
    by_key: HashMap<String, usize>,
    dataset_digest: Option<String>,
    downloaded: Vec<String>,
}

impl RestoredResults {
    pub fn source(&self) -> &RunRef {
        &self.source
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when every record carried a distinct item key.
    pub fn is_keyed(&self) -> bool {
        !self.records.is_empty() && self.by_key.len() == self.records.len()
    }

    /// Item key record `index` was computed for, if one was stored.
    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.keys.get(index)?.as_deref()
    }

    /// Digest of the dataset the earlier run evaluated, if it recorded one.
    pub fn dataset_digest(&self) -> Option<&str> {
        self.dataset_digest.as_deref()
    }

    /// Artifact names downloaded into the working directory.
    pub fn downloaded(&self) -> &[String] {
        &self.downloaded
    }

    /// Prior result for dataset item `index` with optional stable `key`.
    ///
    /// A positional hit whose stored key differs from `key` is still
    /// returned, with a warning.
    pub fn lookup(&self, index: usize, key: Option<&str>) -> Option<&ResultRecord> {
        if let Some(key) = key {
            if self.is_keyed() {
                return self.by_key.get(key).map(|&i| &self.records[i]);
            }
        }
        let record = self.records.get(index)?;
        if let (Some(current), Some(stored)) = (key, self.key_at(index)) {
            if current != stored {
                warn!(
                    step = index,
                    current = %current,
                    stored = %stored,
                    "restored record was computed for a different item"
                );
            }
        }
        Some(record)
    }
}

fn restore_error(run: &RunRef, source: TrackingError) -> ExpError {
    ExpError::Restore {
        run: run.to_string(),
        source,
    }
}

/// Resolve `run` into its result records and download its `exp_log/`
/// artifacts beneath `dest_root`.
///
/// Any backend failure is fatal for the session being opened.
pub async fn resolve_restore<H: RunHistory + ?Sized>(
    history: &H,
    run: &RunRef,
    dest_root: &Path,
) -> Result<RestoredResults> {
    println!("Restoring from run: {run}");

    let record = history
        .get_run(run)
        .await
        .map_err(|e| restore_error(run, e))?;
    let dataset_digest = record
        .metadata
        .config
        .get(DATASET_DIGEST_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string);

    let rows = history.history(run).await.map_err(|e| restore_error(run, e))?;
    let mut records = Vec::with_capacity(rows.len());
    let mut keys = Vec::with_capacity(rows.len());
    let mut by_key = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        let key = row.get(ITEM_KEY_FIELD).and_then(Value::as_str).map(str::to_string);
        if let Some(key) = &key {
            if by_key.insert(key.clone(), index).is_some() {
                warn!(
                    run = %run,
                    key = %key,
                    "duplicate item key in restored history; keeping the latest"
                );
            }
        }
        keys.push(key);
        records.push(ResultRecord::from_history_row(row));
    }

    println!("Downloading files...");
    let prefix = format!("{LOG_DIR_NAME}/");
    let files: Vec<_> = history
        .files(run)
        .await
        .map_err(|e| restore_error(run, e))?
        .into_iter()
        .filter(|f| f.name.starts_with(&prefix))
        .collect();
    let mut downloaded = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        println!("Downloading file({}/{}): {}", i + 1, files.len(), file.name);
        let path = history
            .download(run, &file.name, dest_root)
            .await
            .map_err(|e| restore_error(run, e))?;
        debug!(file = %file.name, path = %path.display(), "artifact downloaded");
        downloaded.push(file.name.clone());
    }

    crate::obs::emit_run_restored(&run.to_string(), records.len(), downloaded.len());

    Ok(RestoredResults {
        source: run.clone(),
        records,
        keys,
        by_key,
        dataset_digest,
        downloaded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use easy_exp_tracking::fakes::MemoryTracker;
    use easy_exp_tracking::{FsTracker, RunMetadata, RunStatus, Tracker};
    use serde_json::json;
    use tracing_test::traced_test;

    fn row(value: serde_json::Value) -> easy_exp_tracking::HistoryRow {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn positional_lookup_without_keys() {
        let tracker = MemoryTracker::new();
        let run = tracker.seed_run(
            "math",
            "first",
            vec![row(json!({"x": 1})), row(json!({"x": 2}))],
            vec![],
        );
        let dir = tempfile::tempdir().unwrap();

        let restored = resolve_restore(&tracker, &run, dir.path()).await.unwrap();
        assert!(!restored.is_keyed());
        assert_eq!(restored.lookup(1, Some("ignored")).unwrap().get_f64("x"), Some(2.0));
        assert!(restored.lookup(2, None).is_none());
    }

    #[tokio::test]
    async fn keyed_lookup_ignores_position() {
        let tracker = MemoryTracker::new();
        let run = tracker.seed_run(
            "math",
            "first",
            vec![
                row(json!({"x": 1, "_item_key": "p1"})),
                row(json!({"x": 2, "_item_key": "p2"})),
            ],
            vec![],
        );
        let dir = tempfile::tempdir().unwrap();

        let restored = resolve_restore(&tracker, &run, dir.path()).await.unwrap();
        assert!(restored.is_keyed());
        assert_eq!(restored.lookup(0, Some("p2")).unwrap().get_f64("x"), Some(2.0));
        assert!(restored.lookup(0, Some("p9")).is_none());
        assert!(!restored.records()[0].contains_key(ITEM_KEY_FIELD));
    }

    #[traced_test]
    #[tokio::test]
    async fn partially_keyed_history_falls_back_to_position() {
        let tracker = MemoryTracker::new();
        let run = tracker.seed_run(
            "math",
            "first",
            vec![
                row(json!({"x": 1, "_item_key": "p1"})),
                row(json!({"x": 2})),
            ],
            vec![],
        );
        let dir = tempfile::tempdir().unwrap();

        let restored = resolve_restore(&tracker, &run, dir.path()).await.unwrap();
        assert!(!restored.is_keyed());
        assert_eq!(restored.key_at(0), Some("p1"));
        assert_eq!(restored.key_at(1), None);
        assert_eq!(restored.lookup(0, Some("p7")).unwrap().get_f64("x"), Some(1.0));
        assert!(logs_contain("restored record was computed for a different item"));
    }

    #[tokio::test]
    async fn only_log_artifacts_are_downloaded() {
        let tracker = MemoryTracker::new();
        let run = tracker.seed_run(
            "math",
            "first",
            vec![row(json!({"x": 1, "log_path": "true/p1.log"}))],
            vec![
                ("exp_log/true/p1.log".to_string(), b"transcript".to_vec()),
                ("config.yaml".to_string(), b"ignored".to_vec()),
            ],
        );
        let dir = tempfile::tempdir().unwrap();

        let restored = resolve_restore(&tracker, &run, dir.path()).await.unwrap();
        assert_eq!(restored.downloaded(), ["exp_log/true/p1.log".to_string()]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("exp_log/true/p1.log")).unwrap(),
            "transcript"
        );
        assert!(!dir.path().join("config.yaml").exists());
    }

    #[tokio::test]
    async fn unreachable_backend_is_fatal() {
        let tracker = MemoryTracker::new();
        let run = tracker.seed_run("math", "first", vec![], vec![]);
        tracker.set_unavailable(true);
        let dir = tempfile::tempdir().unwrap();

        let err = resolve_restore(&tracker, &run, dir.path()).await.unwrap_err();
        assert!(matches!(err, ExpError::Restore { .. }));
    }

    async fn assert_resolves_identically<H: RunHistory + ?Sized>(history: &H, run: &RunRef) {
        let first_dir = tempfile::tempdir().unwrap();
        let second_dir = tempfile::tempdir().unwrap();
        let first = resolve_restore(history, run, first_dir.path()).await.unwrap();
        let second = resolve_restore(history, run, second_dir.path()).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first.records(), second.records());
        assert_eq!(first.downloaded(), second.downloaded());
        assert_eq!(first.key_at(1), second.key_at(1));
        assert_eq!(
            std::fs::read(first_dir.path().join("exp_log/false/p2.log")).unwrap(),
            std::fs::read(second_dir.path().join("exp_log/false/p2.log")).unwrap()
        );
    }

    #[tokio::test]
    async fn resolving_twice_gives_the_same_results() {
        let rows = vec![
            row(json!({"x": 1, "log_path": "true/p1.log", "_item_key": "p1"})),
            row(json!({"x": 2, "log_path": "false/p2.log", "_item_key": "p2"})),
        ];
        let files = vec![
            ("exp_log/true/p1.log".to_string(), b"one".to_vec()),
            ("exp_log/false/p2.log".to_string(), b"two".to_vec()),
        ];

        let memory = MemoryTracker::new();
        let run = memory.seed_run("math", "first", rows.clone(), files.clone());
        assert_resolves_identically(&memory, &run).await;

        let store = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let fs_tracker = FsTracker::new(store.path(), "tester").unwrap();
        let mut session = fs_tracker
            .init(RunMetadata {
                project: "math".to_string(),
                name: "first".to_string(),
                config: Default::default(),
            })
            .await
            .unwrap();
        for r in &rows {
            session.log(r).await.unwrap();
        }
        for (name, contents) in &files {
            let local = scratch.path().join("upload.log");
            std::fs::write(&local, contents).unwrap();
            session.save(&local, name).await.unwrap();
        }
        session.finish(RunStatus::Finished).await.unwrap();
        let run = session.run().clone();
        assert_resolves_identically(&fs_tracker, &run).await;
    }
}
