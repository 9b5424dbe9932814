//! Model cost table and token accounting.

use serde::{Deserialize, Serialize};

use crate::message::ChatResponse;

/// Price per 1K tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelCost {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl ModelCost {
    const fn new(prompt_per_1k: f64, completion_per_1k: f64) -> Self {
        Self {
            prompt_per_1k,
            completion_per_1k,
        }
    }

    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        self.prompt_per_1k * prompt_tokens as f64 / 1000.0
            + self.completion_per_1k * completion_tokens as f64 / 1000.0
    }
}

/// Look up the price of a known model. Returns None for unknown models.
pub fn model_cost(model: &str) -> Option<ModelCost> {
    let cost = match model {
        "deepseek-chat" => ModelCost::new(0.002, 0.008),
        "gpt-3.5-turbo" | "gpt-3.5-turbo-0125" => ModelCost::new(0.0035, 0.0105),
        "gpt-3.5-turbo-1106" => ModelCost::new(0.007, 0.014),
        "gpt-3.5-turbo-16k" => ModelCost::new(0.021, 0.028),
        "gpt-3.5-turbo-instruct" => ModelCost::new(0.0105, 0.014),
        "o1-mini" => ModelCost::new(0.021, 0.084),
        "o1-preview" => ModelCost::new(0.105, 0.42),
        "gpt-4" | "gpt-4-0613" => ModelCost::new(0.21, 0.42),
        "gpt-4o" | "gpt-4o-2024-08-06" | "gpt-4o-2024-11-20" => ModelCost::new(0.0175, 0.07),
        "gpt-4o-2024-05-13" | "chatgpt-4o-latest" => ModelCost::new(0.035, 0.105),
        "gpt-4o-mini" => ModelCost::new(0.00105, 0.0042),
        "gpt-4-turbo"
        | "gpt-4-turbo-2024-04-09"
        | "gpt-4-turbo-preview"
        | "gpt-4-0125-preview"
        | "gpt-4-1106-preview"
        | "gpt-4-vision-preview" => ModelCost::new(0.07, 0.21),
        "claude-3-5-sonnet-20240620" | "claude-3-5-sonnet-20241022" => {
            ModelCost::new(0.015, 0.075)
        }
        "claude-3-5-haiku-20241022" => ModelCost::new(0.005, 0.025),
        "gemini-1.5-flash-latest" => ModelCost::new(0.0006, 0.0024),
        "gemini-1.5-pro-latest" | "gemini-exp-1206" | "gemini-2.0-flash-exp" => {
            ModelCost::new(0.01, 0.04)
        }
        "qwen2.5-32b-instruct" => ModelCost::new(0.002, 0.006),
        "qwq-plus" => ModelCost::new(0.0016, 0.004),
        "qwen-long" => ModelCost::new(0.0005, 0.002),
        "qwen-max" => ModelCost::new(0.0024, 0.0096),
        "qwen-vl-ocr" => ModelCost::new(0.005, 0.005),
        _ => return None,
    };
    Some(cost)
}

/// Token and cost accumulator, owned by whoever makes the calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost: f64,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one response's usage.
    pub fn add(&mut self, response: &ChatResponse) {
        self.prompt_tokens += response.prompt_tokens;
        self.completion_tokens += response.completion_tokens;
        self.total_tokens += response.total_tokens();
        self.cost += response.cost;
    }

    /// Add another accumulator.
    pub fn merge(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.cost += other.cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(prompt: u64, completion: u64, cost: f64) -> ChatResponse {
        ChatResponse {
            content: String::new(),
            model: "gpt-4o".to_string(),
            prompt_tokens: prompt,
            completion_tokens: completion,
            cost,
        }
    }

    #[test]
    fn cost_is_per_thousand_tokens() {
        let cost = model_cost("gpt-4o").unwrap().cost(1000, 500);
        assert!((cost - (0.0175 + 0.035)).abs() < 1e-12);
        assert!(model_cost("my-local-model").is_none());
    }

    #[test]
    fn usage_accumulates_per_owner() {
        let mut solver = TokenUsage::new();
        let mut judge = TokenUsage::new();
        solver.add(&response(10, 5, 0.5));
        solver.add(&response(1, 1, 0.25));
        judge.add(&response(100, 1, 1.0));

        assert_eq!(solver.total_tokens, 17);
        assert_eq!(judge.total_tokens, 101);

        let mut all = solver;
        all.merge(&judge);
        assert_eq!(all.prompt_tokens, 111);
        assert!((all.cost - 1.75).abs() < 1e-12);
    }
}
