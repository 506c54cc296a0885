//! Service and sampling configuration
//!
//! Service settings come from the environment; sampling parameters belong to
//! a chat session and are validated before they are used.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful AI assistant explaining technical concepts clearly.";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No API key configured. Set GEMINI_API_KEY (or API_KEY).")]
    MissingApiKey,
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{field} = {value} is outside the allowed range {range}")]
    OutOfRange {
        field: &'static str,
        value: String,
        range: &'static str,
    },
    #[error("Unknown setting `{0}` (expected temperature, top_k, top_p, max_output_tokens or system)")]
    UnknownSetting(String),
    #[error("{field} expects a number, got {value:?}")]
    InvalidValue { field: &'static str, value: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Connection settings for the model service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timeout = match lookup("GEMINI_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                    var: "GEMINI_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.timeout,
        };

        Ok(Self {
            api_key: lookup("GEMINI_API_KEY").or_else(|| lookup("API_KEY")),
            base_url: lookup("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            chat_model: lookup("GEMINI_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: lookup("GEMINI_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            timeout,
        })
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey),
        }
    }
}

/// Sampling parameters for a chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
    pub system_instruction: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1000,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl ModelConfig {
    pub const MAX_TEMPERATURE: f64 = 2.0;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=Self::MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(ConfigError::OutOfRange {
                field: "temperature",
                value: self.temperature.to_string(),
                range: "0.0..=2.0",
            });
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::OutOfRange {
                field: "top_p",
                value: self.top_p.to_string(),
                range: "0.0..=1.0",
            });
        }
        if self.top_k == 0 {
            return Err(ConfigError::OutOfRange {
                field: "top_k",
                value: "0".to_string(),
                range: ">= 1",
            });
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_output_tokens",
                value: "0".to_string(),
                range: ">= 1",
            });
        }
        Ok(())
    }

    /// Copy with one setting changed, as typed in `/config <key> <value>`
    pub fn with_setting(&self, key: &str, value: &str) -> Result<Self, ConfigError> {
        fn number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field,
                value: value.to_string(),
            })
        }

        let mut next = self.clone();
        match key.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "temperature" | "temp" => next.temperature = number("temperature", value)?,
            "top_k" | "topk" => next.top_k = number("top_k", value)?,
            "top_p" | "topp" => next.top_p = number("top_p", value)?,
            "max_output_tokens" | "max_tokens" => {
                next.max_output_tokens = number("max_output_tokens", value)?;
            }
            "system" | "system_instruction" => next.system_instruction = value.trim().to_string(),
            _ => return Err(ConfigError::UnknownSetting(key.to_string())),
        }
        next.validate()?;
        Ok(next)
    }
}

/// Load raw tool definitions text from a file
pub fn read_tool_definitions(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
