//! Run controller: the per-item evaluation loop.
//!
//! A [`RunController`] owns everything one run touches: the local log
//! directory, the tracking session, the restored results and the error log.
//! Items are processed strictly one at a time, in dataset order.
//!
//! ```ignore
//! let mut runner = RunController::open(config, Some(tracker)).await?;
//! let report = runner.run(&dataset, &step, &model, &mut metric).await;
//! runner.close().await?;
//! ```

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{warn, Instrument};

use easy_exp_tracking::{RunId, RunMetadata, RunRef, RunStatus, Tracker, TrackingSession};

use crate::capture::StepLog;
use crate::dataset::Dataset;
use crate::domain::{ExpError, Result, ResultRecord, RunConfig, StepError};
use crate::error_log::ErrorLog;
use crate::experiment::{Metric, StepExecutor};
use crate::metrics::{RunMetrics, RunReport};
use crate::recording::ResultRecorder;
use crate::restore::{resolve_restore, RestoredResults};

enum StepOutcome {
    Recorded { restored: bool },
    Empty,
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Destroy and recreate the local log directory.
fn recreate_log_dir(log_dir: &Path) -> Result<()> {
    if log_dir.exists() {
        fs::remove_dir_all(log_dir).map_err(|e| {
            ExpError::Configuration(format!("cannot remove {}: {e}", log_dir.display()))
        })?;
    }
    fs::create_dir_all(log_dir)
        .map_err(|e| ExpError::Configuration(format!("cannot create {}: {e}", log_dir.display())))
}

/// Orchestrates one experiment run.
pub struct RunController {
    config: RunConfig,
    session: Option<Box<dyn TrackingSession>>,
    restored: Option<RestoredResults>,
    recorder: ResultRecorder,
    error_log: ErrorLog,
    cancel: CancellationToken,
    recorded: usize,
    closed: bool,
}

impl RunController {
    /// Open a run.
    ///
    /// Recreates `exp_log/` (anything left there is lost), opens a tracking
    /// session when tracking is on and resolves `restore_from` through
    /// `tracker` before any item is processed.
    pub async fn open(config: RunConfig, tracker: Option<Arc<dyn Tracker>>) -> Result<Self> {
        let log_dir = config.log_dir();
        recreate_log_dir(&log_dir)?;

        let needs_tracker = config.tracking || config.restore_from.is_some();
        let tracker = match tracker {
            Some(tracker) => Some(tracker),
            None if needs_tracker => {
                return Err(ExpError::Configuration(
                    "tracking or restore requested but no tracker configured".to_string(),
                ))
            }
            None => None,
        };

        let mut session = None;
        if let (true, Some(tracker)) = (config.tracking, &tracker) {
            let metadata = RunMetadata {
                project: config.project.clone(),
                name: config.name.clone(),
                config: config.tracked_config(),
            };
            session = Some(tracker.init(metadata).await?);
        }

        let mut restored = None;
        if let (Some(run_id), Some(tracker)) = (&config.restore_from, &tracker) {
            let source = RunRef::new(
                tracker.account(),
                config.project.clone(),
                RunId(run_id.clone()),
            );
            match resolve_restore(&**tracker, &source, config.workdir()).await {
                Ok(results) => restored = Some(results),
                Err(err) => {
                    if let Some(mut session) = session.take() {
                        if let Err(finish_err) = session.finish(RunStatus::Cancelled).await {
                            warn!(
                                error = %finish_err,
                                "failed to close session after restore error"
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }

        if let Some(results) = &restored {
            if let (Some(prior), Some(current)) =
                (results.dataset_digest(), &config.dataset_digest)
            {
                if prior != current {
                    warn!(
                        source = %results.source(),
                        prior = %prior,
                        current = %current,
                        "dataset changed since the restored run; restored results may be misattributed"
                    );
                }
            }
        }

        crate::obs::emit_run_opened(
            &config.name,
            session.as_ref().map(|s| s.run().run_id.as_str()),
            restored.as_ref().map_or(0, RestoredResults::len),
        );

        Ok(Self {
            recorder: ResultRecorder::new(log_dir, config.capture_path()),
            error_log: ErrorLog::new(config.error_log_path()),
            config,
            session,
            restored,
            cancel: CancellationToken::new(),
            recorded: 0,
            closed: false,
        })
    }

    /// Use an externally owned cancellation token (e.g. one bound to Ctrl-C).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The open tracking run, if any.
    pub fn tracked_run(&self) -> Option<&RunRef> {
        self.session.as_ref().map(|s| s.run())
    }

    pub fn restored(&self) -> Option<&RestoredResults> {
        self.restored.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Record one step's results. `restore_flag` marks replayed results,
    /// whose capture file is not moved.
    ///
    /// Fails with [`ExpError::SessionClosed`] once the run is closed.
    pub async fn record(
        &mut self,
        results: &ResultRecord,
        restore_flag: bool,
        item_key: Option<&str>,
    ) -> Result<()> {
        if self.closed {
            return Err(ExpError::SessionClosed);
        }
        let target = self
            .recorder
            .record(results, restore_flag, item_key, self.session.as_mut())
            .await?;
        crate::obs::emit_step_recorded(
            self.recorded,
            restore_flag,
            target.as_ref().map(|t| t.artifact.as_str()),
        );
        self.recorded += 1;
        Ok(())
    }

    /// Drive the loop over `dataset`.
    ///
    /// Returns once the dataset is exhausted or cancellation is observed.
    /// Per-item failures are written to `error.log` and skipped; on
    /// cancellation the session is closed before returning.
    pub async fn run<D, S>(
        &mut self,
        dataset: &D,
        step: &S,
        model: &S::Model,
        metric: &mut S::Metric,
    ) -> Result<RunReport>
    where
        D: Dataset<Item = S::Item> + ?Sized,
        S: StepExecutor,
        S::Item: Serialize,
    {
        if self.closed {
            return Err(ExpError::SessionClosed);
        }
        let span = crate::obs::run_span(&self.config.name);
        self.drive(dataset, step, model, metric).instrument(span).await
    }

    async fn drive<D, S>(
        &mut self,
        dataset: &D,
        step: &S,
        model: &S::Model,
        metric: &mut S::Metric,
    ) -> Result<RunReport>
    where
        D: Dataset<Item = S::Item> + ?Sized,
        S: StepExecutor,
        S::Item: Serialize,
    {
        let items: Vec<&S::Item> = dataset.iter().collect();
        if items.len() != dataset.len() {
            warn!(
                len = dataset.len(),
                iterated = items.len(),
                "dataset length disagrees with its iteration"
            );
        }
        let total = items.len();
        let mut metrics = RunMetrics::default();
        let mut cancelled = false;
        let cancel = self.cancel.clone();

        for (index, item) in items.into_iter().enumerate() {
            let item_json = serde_json::to_string_pretty(item)
                .unwrap_or_else(|e| format!("<unserializable item: {e}>"));
            println!();
            println!("Evaluating [{}/{}]: \n{item_json}", index + 1, total);
            let key = dataset.item_key(item);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(StepError::Cancelled),
                res = self.process_item(index, item, key.as_deref(), step, model, metric) => res,
            };

            match outcome {
                Ok(StepOutcome::Recorded { restored: true }) => metrics.inc_restored(),
                Ok(StepOutcome::Recorded { restored: false }) => metrics.inc_fresh(),
                Ok(StepOutcome::Empty) => metrics.inc_empty(),
                Err(StepError::Cancelled) => {
                    crate::obs::emit_run_cancelled(index);
                    println!("Cancelled while evaluating step {index}");
                    cancelled = true;
                    self.close_with(RunStatus::Cancelled).await?;
                    break;
                }
                Err(StepError::Failed(err)) => {
                    metrics.inc_failed();
                    if let Err(log_err) = self.error_log.append(&item_json, &err) {
                        warn!(
                            error = %log_err,
                            path = %self.error_log.path().display(),
                            "failed to append to error log"
                        );
                    }
                    println!("Error processing step {index}: {err}");
                    crate::obs::emit_step_failed(index, &err);
                }
            }
        }

        metrics.flush();
        Ok(RunReport {
            total,
            metrics,
            cancelled,
        })
    }

    async fn process_item<S: StepExecutor>(
        &mut self,
        index: usize,
        item: &S::Item,
        key: Option<&str>,
        step: &S,
        model: &S::Model,
        metric: &mut S::Metric,
    ) -> std::result::Result<StepOutcome, StepError> {
        let capture_path = self.config.capture_path();
        remove_if_exists(&capture_path)?;

        let prior = self
            .restored
            .as_ref()
            .and_then(|r| r.lookup(index, key))
            .cloned();

        let (results, restore_flag) = match prior {
            Some(record) => {
                println!("Restore from existing data...");
                metric.record(&record)?;
                (Some(record), true)
            }
            None => {
                let mut log = if self.config.capture_output {
                    StepLog::capture(&capture_path)?
                } else {
                    StepLog::console()
                };
                let outcome = step.run_step(index, item, model, metric, &mut log).await;
                let flushed = log.finish();
                let results = outcome?;
                flushed?;
                (results, false)
            }
        };

        let Some(results) = results else {
            println!("No results");
            warn!(step = index, "no results");
            return Ok(StepOutcome::Empty);
        };

        let pretty = serde_json::to_string_pretty(&results).map_err(ExpError::from)?;
        println!("Results: \n{pretty}");
        self.record(&results, restore_flag, key).await?;
        Ok(StepOutcome::Recorded {
            restored: restore_flag,
        })
    }

    async fn close_with(&mut self, status: RunStatus) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut session) = self.session.take() {
            session.finish(status).await?;
        }
        crate::obs::emit_run_closed(&self.config.name, &status.to_string());
        Ok(())
    }

    /// Finish the tracking session. Safe to call more than once, and after
    /// a cancelled run (which already closed it).
    pub async fn close(&mut self) -> Result<()> {
        self.close_with(RunStatus::Finished).await
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        warn!(run_name = %self.config.name, "run controller dropped without close()");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = session.finish(RunStatus::Finished).await {
                        warn!(error = %err, "failed to finish dropped session");
                    }
                });
            }
            Err(_) => warn!("no runtime available to finish the tracking session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easy_exp_tracking::fakes::MemoryTracker;
    use tracing_test::traced_test;

    fn shared(tracker: &MemoryTracker) -> Arc<dyn Tracker> {
        Arc::new(tracker.clone())
    }

    #[traced_test]
    #[tokio::test]
    async fn changed_dataset_digest_is_warned_about() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = MemoryTracker::new();

        let first = RunConfig::new("math", "first")
            .with_workdir(dir.path())
            .with_dataset_digest("aaaa");
        let mut runner = RunController::open(first, Some(shared(&tracker))).await.unwrap();
        let prior = runner.tracked_run().cloned().unwrap();
        runner.close().await.unwrap();

        let second = RunConfig::new("math", "second")
            .with_workdir(dir.path())
            .with_dataset_digest("bbbb")
            .with_restore_from(prior.run_id.as_str());
        let mut runner = RunController::open(second, Some(shared(&tracker))).await.unwrap();
        runner.close().await.unwrap();

        assert!(logs_contain("dataset changed since the restored run"));
        assert!(logs_contain("run.opened"));
        assert!(logs_contain("run.closed"));
    }

    #[traced_test]
    #[tokio::test]
    async fn matching_digest_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = MemoryTracker::new();
        let cfg = RunConfig::new("math", "first")
            .with_workdir(dir.path())
            .with_dataset_digest("aaaa");
        let mut runner = RunController::open(cfg.clone(), Some(shared(&tracker))).await.unwrap();
        let prior = runner.tracked_run().cloned().unwrap();
        runner.close().await.unwrap();

        let mut runner = RunController::open(
            cfg.with_restore_from(prior.run_id.as_str()),
            Some(shared(&tracker)),
        )
        .await
        .unwrap();
        runner.close().await.unwrap();

        assert!(!logs_contain("dataset changed"));
    }

    #[tokio::test]
    async fn failed_restore_closes_the_new_session() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = MemoryTracker::new();
        let cfg = RunConfig::new("math", "resume")
            .with_workdir(dir.path())
            .with_restore_from("missing1");

        let err = RunController::open(cfg, Some(shared(&tracker))).await.err().unwrap();
        assert!(matches!(err, ExpError::Restore { .. }));

        let opened = tracker.opened_runs();
        assert_eq!(opened.len(), 1);
        assert_eq!(tracker.finish_calls(&opened[0]), 1);
    }
}
