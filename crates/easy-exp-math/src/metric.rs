//! LLM-judged correctness with running aggregates.

use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;

use easy_exp_core::{Metric, ResultRecord, StepLog};
use easy_exp_llm::{ChatClient, ChatOptions, Message, TokenUsage};

pub const DEFAULT_JUDGE_MODEL: &str = "qwen-turbo-latest";

const JUDGE_SYSTEM_PROMPT: &str = "You are an experienced mathematics teacher with a strong grasp of logical reasoning and precise calculations, capable of quickly identifying the core of mathematical problems and evaluating the consistency between answers and solution processes.";

fn judge_prompt(problem: &str, solution: &str, answer: &str) -> String {
    format!(
        "Here is the math problem:\n\n{problem} \n\n with standard solution:\n\n{solution}\n\n The student's answer is:\n\n{answer}\n\n Please check whether the answer is correct or not. Please answer in True or False directly without any additional explanations."
    )
}

/// One solved problem, ready for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub problem: String,
    /// The solver's full response.
    pub response: String,
    /// The reference solution.
    pub solution: String,
    pub seconds: f64,
    pub usage: TokenUsage,
}

/// Field names of the records this metric produces.
pub mod fields {
    pub const IS_CORRECT: &str = "is_correct";
    pub const CORRECT_NUM: &str = "correct_num";
    pub const ACCURACY: &str = "accuracy";
    pub const TIME: &str = "time";
    pub const AVERAGE_TIME: &str = "average_time";
    pub const COST: &str = "cost";
    pub const AVERAGE_COST: &str = "average_cost";
}

/// Running accuracy, time and cost over judged problems.
pub struct ProblemMetric {
    judge: Arc<dyn ChatClient>,
    judge_model: String,
    count: u64,
    correct_count: u64,
    total_time: f64,
    total_cost: f64,
    judge_usage: TokenUsage,
}

impl ProblemMetric {
    pub fn new(judge: Arc<dyn ChatClient>) -> Self {
        Self::with_model(judge, DEFAULT_JUDGE_MODEL)
    }

    pub fn with_model(judge: Arc<dyn ChatClient>, judge_model: impl Into<String>) -> Self {
        Self {
            judge,
            judge_model: judge_model.into(),
            count: 0,
            correct_count: 0,
            total_time: 0.0,
            total_cost: 0.0,
            judge_usage: TokenUsage::new(),
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn correct_count(&self) -> u64 {
        self.correct_count
    }

    pub fn accuracy(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.count as f64
        }
    }

    pub fn average_time(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_time / self.count as f64
        }
    }

    pub fn average_cost(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_cost / self.count as f64
        }
    }

    /// Tokens spent on judge calls, tracked apart from the solver's cost.
    pub fn judge_usage(&self) -> &TokenUsage {
        &self.judge_usage
    }

    /// The one place aggregates change, for fresh and replayed steps alike.
    fn apply(&mut self, correct: bool, seconds: f64, cost: f64) -> ResultRecord {
        self.count += 1;
        self.correct_count += u64::from(correct);
        self.total_time += seconds;
        self.total_cost += cost;

        ResultRecord::new()
            .with(fields::IS_CORRECT, correct)
            .with(fields::CORRECT_NUM, self.correct_count)
            .with(fields::ACCURACY, self.accuracy())
            .with(fields::TIME, seconds)
            .with(fields::AVERAGE_TIME, self.average_time())
            .with(fields::COST, cost)
            .with(fields::AVERAGE_COST, self.average_cost())
    }

    async fn check(
        &mut self,
        problem: &str,
        answer: Option<&str>,
        solution: Option<&str>,
    ) -> anyhow::Result<bool> {
        let Some(answer) = answer else {
            return Ok(false);
        };
        let messages = [
            Message::system(JUDGE_SYSTEM_PROMPT),
            Message::user(judge_prompt(problem, solution.unwrap_or("None"), answer)),
        ];
        let response = self
            .judge
            .chat(&messages, &ChatOptions::model(self.judge_model.as_str()))
            .await
            .with_context(|| format!("judge call to {} failed", self.judge_model))?;
        self.judge_usage.add(&response);
        Ok(response.content.trim().to_lowercase().contains("true"))
    }
}

#[async_trait]
impl Metric for ProblemMetric {
    type Input = Attempt;

    async fn compute(
        &mut self,
        attempt: Attempt,
        log: &mut StepLog,
    ) -> anyhow::Result<ResultRecord> {
        let answer = crate::answer::get_answer(Some(&attempt.response));
        let solution = crate::answer::get_answer(Some(&attempt.solution));

        writeln!(log, "------------------------Agent Answer------------------------")?;
        writeln!(log, "{}", answer.unwrap_or("None"))?;
        writeln!(log, "------------------------Standard Answer------------------------")?;
        writeln!(log, "{}", solution.unwrap_or("None"))?;
        writeln!(log, "------------------------Solution Progress------------------------")?;
        writeln!(log, "{}\n\n", attempt.solution)?;

        let correct = self.check(&attempt.problem, answer, solution).await?;
        Ok(self.apply(correct, attempt.seconds, attempt.usage.cost))
    }

    fn record(&mut self, prior: &ResultRecord) -> anyhow::Result<()> {
        let correct = prior
            .get_bool(fields::IS_CORRECT)
            .ok_or_else(|| anyhow!("restored record lacks {}", fields::IS_CORRECT))?;
        let seconds = prior.get_f64(fields::TIME).unwrap_or(0.0);
        let cost = prior.get_f64(fields::COST).unwrap_or(0.0);
        self.apply(correct, seconds, cost);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easy_exp_llm::fakes::ScriptedChatClient;

    fn attempt(response: &str, seconds: f64, cost: f64) -> Attempt {
        Attempt {
            problem: "1+1?".to_string(),
            response: response.to_string(),
            solution: "so \\boxed{2}".to_string(),
            seconds,
            usage: TokenUsage {
                cost,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn running_aggregates_follow_judgements() {
        let judge = ScriptedChatClient::new();
        judge.push_reply("True", 10, 1, 0.0);
        judge.push_reply("false", 10, 1, 0.0);
        let mut metric = ProblemMetric::new(Arc::new(judge.clone()));
        let mut log = StepLog::console();

        let first = metric.compute(attempt("\\boxed{2}", 2.0, 0.5), &mut log).await.unwrap();
        assert_eq!(first.get_bool(fields::IS_CORRECT), Some(true));
        assert_eq!(first.get_f64(fields::ACCURACY), Some(1.0));

        let second = metric.compute(attempt("\\boxed{3}", 4.0, 1.5), &mut log).await.unwrap();
        assert_eq!(second.get_f64(fields::CORRECT_NUM), Some(1.0));
        assert_eq!(second.get_f64(fields::ACCURACY), Some(0.5));
        assert_eq!(second.get_f64(fields::AVERAGE_TIME), Some(3.0));
        assert_eq!(second.get_f64(fields::AVERAGE_COST), Some(1.0));
        assert_eq!(metric.judge_usage().total_tokens, 22);

        let calls = judge.calls();
        assert_eq!(calls[0].options.model.as_deref(), Some(DEFAULT_JUDGE_MODEL));
        assert!(calls[1].messages[1].content.contains("The student's answer is:\n\n3"));
    }

    #[tokio::test]
    async fn missing_answer_is_wrong_without_a_judge_call() {
        let judge = ScriptedChatClient::new();
        let mut metric = ProblemMetric::new(Arc::new(judge.clone()));
        let record = metric
            .compute(attempt("I don't know", 1.0, 0.0), &mut StepLog::console())
            .await
            .unwrap();
        assert_eq!(record.get_bool(fields::IS_CORRECT), Some(false));
        assert!(judge.calls().is_empty());
    }

    #[tokio::test]
    async fn replay_matches_fresh_computation() {
        let judge = ScriptedChatClient::new();
        judge.push_reply("True", 1, 1, 0.0);
        judge.push_reply("False", 1, 1, 0.0);
        judge.push_reply("True", 1, 1, 0.0);
        let mut fresh = ProblemMetric::new(Arc::new(judge));
        let mut log = StepLog::console();
        let mut records = Vec::new();
        let attempts = [
            ("\\boxed{2}", 1.0, 0.1),
            ("\\boxed{5}", 2.0, 0.2),
            ("\\boxed{2}", 3.0, 0.3),
        ];
        for (resp, secs, cost) in attempts {
            records.push(fresh.compute(attempt(resp, secs, cost), &mut log).await.unwrap());
        }

        // Resume after two steps: replay them, then compute the third.
        let judge = ScriptedChatClient::new();
        judge.push_reply("True", 1, 1, 0.0);
        let mut resumed = ProblemMetric::new(Arc::new(judge));
        resumed.record(&records[0]).unwrap();
        resumed.record(&records[1]).unwrap();
        let last = resumed
            .compute(attempt("\\boxed{2}", 3.0, 0.3), &mut log)
            .await
            .unwrap();

        assert_eq!(last, records[2]);
        assert_eq!(resumed.count(), fresh.count());
        assert_eq!(resumed.correct_count(), 2);
    }

    #[test]
    fn replay_rejects_records_without_verdict() {
        let mut metric = ProblemMetric::new(Arc::new(ScriptedChatClient::new()));
        let err = metric.record(&ResultRecord::new().with("time", 1.0)).unwrap_err();
        assert!(err.to_string().contains("is_correct"));
        assert_eq!(metric.count(), 0);
    }
}
