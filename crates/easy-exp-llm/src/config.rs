//! Endpoint configuration and model-family resolution.
//!
//! Each model belongs to a family (`openai`, `deepseek`, `qwen`) that may
//! carry its own API key and base URL. Anything not configured falls back
//! to `OPENAI_API_KEY`, `OPENAI_API_BASE` and `OPENAI_MODEL`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, LlmResult};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider family a model name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    OpenAi,
    DeepSeek,
    Qwen,
}

impl ModelFamily {
    /// Classify a model by name; unknown names are treated as OpenAI.
    pub fn for_model(model: &str) -> Self {
        if model.contains("openai") || model.contains("gpt") {
            ModelFamily::OpenAi
        } else if model.contains("deepseek") {
            ModelFamily::DeepSeek
        } else if model.contains("qwen") || model.contains("qwq") {
            ModelFamily::Qwen
        } else {
            ModelFamily::OpenAi
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::OpenAi => "openai",
            ModelFamily::DeepSeek => "deepseek",
            ModelFamily::Qwen => "qwen",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for one family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Client configuration, usually the `[llm]` table of `easy-exp.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model used when a call names none.
    pub default_model: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    pub openai: FamilyConfig,
    pub deepseek: FamilyConfig,
    pub qwen: FamilyConfig,
}

/// A fully resolved endpoint for one call.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub model: String,
    pub family: ModelFamily,
    pub api_key: String,
    pub base_url: String,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("model", &self.model)
            .field("family", &self.family)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl LlmConfig {
    pub fn family(&self, family: ModelFamily) -> &FamilyConfig {
        match family {
            ModelFamily::OpenAi => &self.openai,
            ModelFamily::DeepSeek => &self.deepseek,
            ModelFamily::Qwen => &self.qwen,
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Resolve the endpoint for `model` using the process environment.
    pub fn resolve(&self, model: Option<&str>) -> LlmResult<Endpoint> {
        self.resolve_with(model, |key| std::env::var(key).ok())
    }

    /// Resolve the endpoint for `model`, reading fallbacks through `env`.
    pub fn resolve_with(
        &self,
        model: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> LlmResult<Endpoint> {
        let model = model
            .map(str::to_string)
            .or_else(|| self.default_model.clone())
            .or_else(|| env("OPENAI_MODEL"))
            .ok_or(LlmError::NoModel)?;
        let family = ModelFamily::for_model(&model);
        let creds = self.family(family);

        let api_key = creds
            .api_key
            .clone()
            .or_else(|| env("OPENAI_API_KEY"))
            .ok_or_else(|| LlmError::MissingApiKey {
                family: family.to_string(),
            })?;
        let base_url = creds
            .base_url
            .clone()
            .or_else(|| env("OPENAI_API_BASE"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Endpoint {
            model,
            family,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}
