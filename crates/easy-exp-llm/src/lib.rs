//! easy-exp-llm: chat-completion client for experiment collaborators
//!
//! Models and metrics call language models through the [`ChatClient`]
//! trait. Token usage is returned with every [`ChatResponse`] and summed by
//! the caller in its own [`TokenUsage`], so concurrent or consecutive runs
//! never share counters.

mod error;

pub mod client;
pub mod config;
pub mod fakes;
pub mod message;
pub mod usage;

pub use client::{ChatClient, OpenAiChatClient};
pub use config::{Endpoint, FamilyConfig, LlmConfig, ModelFamily, DEFAULT_BASE_URL};
pub use error::{LlmError, LlmResult};
pub use message::{ChatOptions, ChatResponse, Message, Role};
pub use usage::{model_cost, ModelCost, TokenUsage};
