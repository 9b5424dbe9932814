//! Collaborator contracts: model, metric and step executor.
//!
//! The run controller only sees a [`StepExecutor`]. Models and metrics are
//! plain capabilities an executor composes; none of them inherit from a
//! common base.

use async_trait::async_trait;

use crate::capture::StepLog;
use crate::domain::{ResultRecord, StepError};

/// Produces a prediction for one input.
#[async_trait]
pub trait Model: Send + Sync {
    type Input: ?Sized + Sync;
    type Output: Send;

    async fn predict(&self, input: &Self::Input, log: &mut StepLog) -> anyhow::Result<Self::Output>;
}

/// Scores predictions and keeps running aggregates.
///
/// `compute` and `record` must update the aggregates identically, so a
/// resumed run ends with the same running statistics as an uninterrupted one.
#[async_trait]
pub trait Metric: Send {
    type Input: Send;

    /// Score a fresh prediction.
    async fn compute(&mut self, input: Self::Input, log: &mut StepLog)
        -> anyhow::Result<ResultRecord>;

    /// Replay a previously computed record into the aggregates.
    fn record(&mut self, fields: &ResultRecord) -> anyhow::Result<()>;
}

/// Per-experiment logic for one dataset item.
///
/// Returning `Ok(None)` means the step produced nothing worth recording.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    type Item: Sync;
    type Model: Sync;
    type Metric: Metric;

    async fn run_step(
        &self,
        step: usize,
        item: &Self::Item,
        model: &Self::Model,
        metric: &mut Self::Metric,
        log: &mut StepLog,
    ) -> Result<Option<ResultRecord>, StepError>;
}
