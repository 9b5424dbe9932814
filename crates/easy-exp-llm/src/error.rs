//! Error types for the chat client.

/// Chat-completion failures.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no model given and no default model configured (set OPENAI_MODEL)")]
    NoModel,

    #[error("no API key for model family {family} (set OPENAI_API_KEY)")]
    MissingApiKey { family: String },

    #[error("authentication failed for {endpoint}")]
    AuthFailed { endpoint: String },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("failed to parse response: {message}")]
    ResponseParse { message: String },
}

/// Result alias for chat operations.
pub type LlmResult<T> = std::result::Result<T, LlmError>;
