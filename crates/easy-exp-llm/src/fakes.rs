//! In-memory chat client for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::ChatClient;
use crate::error::{LlmError, LlmResult};
use crate::message::{ChatOptions, ChatResponse, Message};

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub options: ChatOptions,
}

#[derive(Debug, Default)]
struct Inner {
    replies: VecDeque<LlmResult<ChatResponse>>,
    calls: Vec<RecordedCall>,
}

/// Replies with queued responses in order. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChatClient {
    inner: Arc<Mutex<Inner>>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

impl ScriptedChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply with the given token counts and cost.
    pub fn push_reply(&self, content: &str, prompt_tokens: u64, completion_tokens: u64, cost: f64) {
        lock(&self.inner).replies.push_back(Ok(ChatResponse {
            content: content.to_string(),
            model: "scripted".to_string(),
            prompt_tokens,
            completion_tokens,
            cost,
        }));
    }

    /// Queue a failure.
    pub fn push_error(&self, err: LlmError) {
        lock(&self.inner).replies.push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.inner).calls.clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.inner).replies.len()
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> LlmResult<ChatResponse> {
        let mut inner = lock(&self.inner);
        inner.calls.push(RecordedCall {
            messages: messages.to_vec(),
            options: options.clone(),
        });
        let reply = inner.replies.pop_front().unwrap_or_else(|| {
            Err(LlmError::ApiRequest {
                message: "no scripted reply left".to_string(),
            })
        });
        reply.map(|mut r| {
            if let Some(model) = &options.model {
                r.model = model.clone();
            }
            r
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_in_order_then_errors() {
        let client = ScriptedChatClient::new();
        client.push_reply("first", 1, 1, 0.0);
        client.push_error(LlmError::RateLimited { retry_after_secs: 1 });

        let opts = ChatOptions::model("gpt-4o");
        let first = client.chat(&[Message::user("q")], &opts).await.unwrap();
        assert_eq!(first.content, "first");
        assert_eq!(first.model, "gpt-4o");
        assert!(client.chat(&[], &opts).await.is_err());
        assert!(client.chat(&[], &opts).await.is_err());
        assert_eq!(client.calls().len(), 3);
        assert_eq!(client.remaining(), 0);
    }
}
