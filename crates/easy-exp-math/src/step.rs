use async_trait::async_trait;

use easy_exp_core::{
    Metric, Model, ResultRecord, StepError, StepExecutor, StepLog, LOG_PATH_KEY,
};

use crate::dataset::MathProblem;
use crate::metric::{fields, Attempt, ProblemMetric};
use crate::model::ProblemModel;

/// Solve, judge, and file the step log under `true/` or `false/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathStep;

/// Log path for a problem, split by verdict.
pub fn verdict_log_path(correct: bool, problem_path: &str) -> String {
    format!("{correct}/{problem_path}")
}

#[async_trait]
impl StepExecutor for MathStep {
    type Item = MathProblem;
    type Model = ProblemModel;
    type Metric = ProblemMetric;

    async fn run_step(
        &self,
        step: usize,
        item: &MathProblem,
        model: &ProblemModel,
        metric: &mut ProblemMetric,
        log: &mut StepLog,
    ) -> Result<Option<ResultRecord>, StepError> {
        tracing::debug!(step, path = %item.path, "solving problem");
        let prediction = model.predict(item.problem.as_str(), log).await?;
        let mut results = metric
            .compute(
                Attempt {
                    problem: item.problem.clone(),
                    response: prediction.response,
                    solution: item.solution.clone(),
                    seconds: prediction.seconds,
                    usage: prediction.usage,
                },
                log,
            )
            .await?;

        let correct = results.get_bool(fields::IS_CORRECT).unwrap_or(false);
        results.insert(LOG_PATH_KEY, verdict_log_path(correct, &item.path));
        Ok(Some(results))
    }
}
