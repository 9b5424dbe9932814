//! `easy-exp.toml` loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use easy_exp_llm::LlmConfig;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "easy-exp.toml";

/// Tracking store location when neither flag, env nor file names one.
pub const DEFAULT_TRACKING_DIR: &str = ".easy_exp";

pub const DEFAULT_ACCOUNT: &str = "local";

/// The whole settings file. Every table is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub run: RunSettings,
    pub llm: LlmConfig,
}

/// `[run]`: defaults for `easy-exp run`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    pub project: Option<String>,
    pub name: Option<String>,
    pub tracking: Option<bool>,
    pub restore_from: Option<String>,
    pub capture_output: Option<bool>,
    pub account: Option<String>,
    pub tracking_dir: Option<PathBuf>,
    /// `[run.config]`: recorded with the tracked run.
    pub config: Map<String, Value>,
}

impl Settings {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path`, or `easy-exp.toml` in `cwd` if present.
    ///
    /// An explicitly named file must exist; the implicit one may not.
    pub fn load(path: Option<&Path>, cwd: &Path) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (cwd.join(DEFAULT_SETTINGS_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid settings file {}", path.display()))
    }

    pub fn account(&self) -> &str {
        self.run.account.as_deref().unwrap_or(DEFAULT_ACCOUNT)
    }

    /// Tracking root: the flag (or `EASY_EXP_TRACKING_DIR`) wins over the file.
    pub fn tracking_dir(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.run.tracking_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACKING_DIR))
    }
}

/// Parse a `key=value` override. Values are read as JSON when they parse,
/// otherwise kept as strings.
pub fn parse_config_pair(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}
