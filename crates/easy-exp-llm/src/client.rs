//! Chat-completion clients.
//!
//! [`OpenAiChatClient`] speaks the OpenAI `/chat/completions` format, which
//! OpenAI, DeepSeek and DashScope (Qwen) all accept.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{LlmError, LlmResult};
use crate::message::{ChatOptions, ChatResponse, Message};
use crate::usage::model_cost;

/// Anything that can answer a chat conversation.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> LlmResult<ChatResponse>;
}

/// Client for OpenAI-compatible endpoints.
pub struct OpenAiChatClient {
    client: Client,
    config: LlmConfig,
}

impl OpenAiChatClient {
    pub fn new(config: LlmConfig) -> LlmResult<Self> {
        let mut builder =
            Client::builder().user_agent(concat!("easy-exp/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| LlmError::ApiRequest {
            message: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn request_body(model: &str, messages: &[Message], options: &ChatOptions) -> Value {
        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        if options.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    /// Parse an OpenAI-format response body.
    fn parse_response(body: &Value, model: &str) -> LlmResult<ChatResponse> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| LlmError::ResponseParse {
                message: "no message in response choices".to_string(),
            })?;
        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let usage = body.get("usage");
        let tokens = |field: &str| {
            usage
                .and_then(|u| u.get(field))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };
        let prompt_tokens = tokens("prompt_tokens");
        let completion_tokens = tokens("completion_tokens");

        // Price by the requested name; providers often answer with a dated alias.
        let cost = model_cost(model)
            .map(|c| c.cost(prompt_tokens, completion_tokens))
            .unwrap_or(0.0);

        Ok(ChatResponse {
            content,
            model: body
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(model)
                .to_string(),
            prompt_tokens,
            completion_tokens,
            cost,
        })
    }

    /// Map an HTTP error status to an [`LlmError`].
    fn map_http_error(status: reqwest::StatusCode, endpoint: &str, body: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => {
                debug!(body = %body, "authentication failed");
                LlmError::AuthFailed {
                    endpoint: endpoint.to_string(),
                }
            }
            429 => LlmError::RateLimited {
                retry_after_secs: serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| v.get("error")?.get("message")?.as_str().map(str::to_string))
                    .and_then(|msg| {
                        msg.split("in ")
                            .last()
                            .and_then(|s| s.trim().trim_end_matches('s').parse::<u64>().ok())
                    })
                    .unwrap_or(5),
            },
            code => LlmError::ApiRequest {
                message: format!("HTTP {code}: {body}"),
            },
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> LlmResult<ChatResponse> {
        let endpoint = self.config.resolve(options.model.as_deref())?;
        let url = format!("{}/chat/completions", endpoint.base_url);
        let body = Self::request_body(&endpoint.model, messages, options);

        debug!(
            url = %url,
            model = %endpoint.model,
            family = %endpoint.family,
            "sending chat request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| LlmError::ApiRequest {
            message: format!("failed to read response body: {e}"),
        })?;
        if !status.is_success() {
            return Err(Self::map_http_error(status, &endpoint.base_url, &text));
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| LlmError::ResponseParse {
            message: format!("invalid JSON: {e}"),
        })?;
        let parsed = Self::parse_response(&json, &endpoint.model)?;
        debug!(
            model = %parsed.model,
            prompt_tokens = parsed.prompt_tokens,
            completion_tokens = parsed.completion_tokens,
            cost = parsed.cost,
            "chat response received"
        );
        Ok(parsed)
    }
}
