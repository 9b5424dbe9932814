//! Solver model: asks an LLM for a boxed answer.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;

use easy_exp_core::{Model, StepLog};
use easy_exp_llm::{ChatClient, ChatOptions, Message, TokenUsage};

pub const DEFAULT_SOLVER_MODEL: &str = "qwen2.5-32b-instruct";

const SOLVER_PROMPT: &str = "You are a professional mathematician. You are given a problem and you need to solve it. Please put the answer in \\boxed{}";

/// The solver's raw answer with its cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Full response text; the answer is its last `\boxed{}`.
    pub response: String,
    /// Wall-clock seconds spent on the call.
    pub seconds: f64,
    pub usage: TokenUsage,
}

/// Solves one problem with a single chat call.
pub struct ProblemModel {
    client: Arc<dyn ChatClient>,
    model: String,
}

impl ProblemModel {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self::with_model(client, DEFAULT_SOLVER_MODEL)
    }

    pub fn with_model(client: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn write_section(log: &mut StepLog, title: &str, body: &str) -> std::io::Result<()> {
    writeln!(log, "------------------------{title}------------------------")?;
    writeln!(log, "{body}")?;
    writeln!(log)?;
    writeln!(log)
}

#[async_trait]
impl Model for ProblemModel {
    type Input = str;
    type Output = Prediction;

    async fn predict(&self, problem: &str, log: &mut StepLog) -> anyhow::Result<Prediction> {
        let messages = [Message::system(SOLVER_PROMPT), Message::user(problem)];
        let started = Instant::now();
        let response = self
            .client
            .chat(&messages, &ChatOptions::model(self.model.as_str()))
            .await
            .with_context(|| format!("solver call to {} failed", self.model))?;
        let seconds = started.elapsed().as_secs_f64();

        write_section(log, "System", &messages[0].content)?;
        write_section(log, "User", &messages[1].content)?;
        write_section(log, "Response", &response.content)?;

        let mut usage = TokenUsage::new();
        usage.add(&response);
        Ok(Prediction {
            response: response.content,
            seconds,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easy_exp_llm::fakes::ScriptedChatClient;

    #[tokio::test]
    async fn prediction_carries_response_and_usage() {
        let client = ScriptedChatClient::new();
        client.push_reply("so \\boxed{2}", 30, 10, 0.01);
        let model = ProblemModel::new(Arc::new(client.clone()));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp.log");
        let mut log = StepLog::capture(&path).unwrap();
        let prediction = model.predict("1+1?", &mut log).await.unwrap();
        log.finish().unwrap();

        assert_eq!(prediction.response, "so \\boxed{2}");
        assert_eq!(prediction.usage.total_tokens, 40);
        assert!(prediction.seconds >= 0.0);

        let calls = client.calls();
        assert_eq!(calls[0].options.model.as_deref(), Some(DEFAULT_SOLVER_MODEL));
        assert_eq!(calls[0].messages[1].content, "1+1?");

        let transcript = std::fs::read_to_string(&path).unwrap();
        assert!(transcript.contains("------------------------Response------------------------"));
        assert!(transcript.contains("so \\boxed{2}"));
    }

    #[tokio::test]
    async fn client_errors_carry_context() {
        let client = ScriptedChatClient::new();
        let model = ProblemModel::with_model(Arc::new(client), "gpt-4o");
        let err = model
            .predict("1+1?", &mut StepLog::console())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("solver call to gpt-4o failed"));
    }
}
