//! Multi-turn chat with adjustable sampling parameters

use crate::config::{ConfigError, ModelConfig};
use crate::llm::{ModelService, ServiceError, Turn, Usage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// One request/response pair as sent over the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLogEntry {
    pub timestamp: DateTime<Utc>,
    /// 1-based position in the log
    pub turn_index: usize,
    pub request: Value,
    pub response: Value,
}

impl ApiLogEntry {
    pub fn is_error(&self) -> bool {
        self.request.get("error").is_some()
    }
}

/// Chat conversation state
///
/// Every send carries the whole history; the service keeps nothing between
/// calls, so clearing `history` forgets the conversation for good.
#[derive(Debug, Clone)]
pub struct ChatSession {
    initial_config: ModelConfig,
    config: ModelConfig,
    history: Vec<Turn>,
    log: Vec<ApiLogEntry>,
    usage: Usage,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl ChatSession {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            initial_config: config.clone(),
            config,
            history: Vec::new(),
            log: Vec::new(),
            usage: Usage::default(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn log(&self) -> &[ApiLogEntry] {
        &self.log
    }

    /// Token totals across successful sends
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Replace sampling parameters; invalid ones leave the current config
    pub fn set_config(&mut self, config: ModelConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Send one user message and return the model's reply
    ///
    /// On failure the history is untouched and an error entry is logged.
    pub async fn send<S>(&mut self, service: &S, text: &str) -> Result<String, ChatError>
    where
        S: ModelService + ?Sized,
    {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        match service.complete_chat(&self.history, text, &self.config).await {
            Ok(completion) => {
                self.push_log(completion.exchange.request, completion.exchange.response);
                self.history.push(Turn::user(text));
                self.history.push(Turn::model(completion.text.clone()));
                self.usage.input_tokens += completion.usage.input_tokens;
                self.usage.output_tokens += completion.usage.output_tokens;
                Ok(completion.text)
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind.as_str(), "Chat request failed");
                self.push_log(
                    json!({ "error": "Request Failed" }),
                    json!({ "error": e.message }),
                );
                Err(ChatError::Service(e))
            }
        }
    }

    /// Clear history and log, restoring the config the session started with
    pub fn reset(&mut self) {
        self.history.clear();
        self.log.clear();
        self.usage = Usage::default();
        self.config = self.initial_config.clone();
    }

    fn push_log(&mut self, request: Value, response: Value) {
        self.log.push(ApiLogEntry {
            timestamp: Utc::now(),
            turn_index: self.log.len() + 1,
            request,
            response,
        });
    }
}
