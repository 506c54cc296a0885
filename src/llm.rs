//! Model service abstraction
//!
//! The contract every generative backend implements: chat completion,
//! tool-enabled completion, tool-result submission and text embedding. Calls
//! are stateless; each one carries the full history.

mod error;
mod gemini;
mod types;

#[cfg(test)]
mod proptests;

pub use error::{ServiceError, ServiceErrorKind};
pub use gemini::GeminiService;
pub use types::*;

use crate::config::ModelConfig;
use crate::tools::ToolDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for model services
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Plain chat turn with sampling parameters
    async fn complete_chat(
        &self,
        history: &[Turn],
        message: &str,
        config: &ModelConfig,
    ) -> Result<ChatCompletion, ServiceError>;

    /// User message with tool declarations attached
    async fn complete_with_tools(
        &self,
        history: &[Turn],
        message: &str,
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ServiceError>;

    /// Hand a tool result back; the model may chain another call
    async fn submit_tool_result(
        &self,
        history: &[Turn],
        tool_name: &str,
        result: &Value,
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ServiceError>;

    /// Vector embedding of `text`
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: ModelService + ?Sized> ModelService for Arc<T> {
    async fn complete_chat(
        &self,
        history: &[Turn],
        message: &str,
        config: &ModelConfig,
    ) -> Result<ChatCompletion, ServiceError> {
        (**self).complete_chat(history, message, config).await
    }

    async fn complete_with_tools(
        &self,
        history: &[Turn],
        message: &str,
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ServiceError> {
        (**self).complete_with_tools(history, message, tools).await
    }

    async fn submit_tool_result(
        &self,
        history: &[Turn],
        tool_name: &str,
        result: &Value,
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ServiceError> {
        (**self)
            .submit_tool_result(history, tool_name, result, tools)
            .await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        (**self).embed(text).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for model services
pub struct LoggingService<S> {
    inner: S,
}

impl<S: ModelService> LoggingService<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    fn log_outcome<T>(&self, operation: &str, started: Instant, result: &Result<T, ServiceError>) {
        let duration = started.elapsed();
        match result {
            Ok(_) => {
                tracing::info!(
                    model = %self.inner.model_id(),
                    operation,
                    duration_ms = %duration.as_millis(),
                    "Model request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.inner.model_id(),
                    operation,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind.as_str(),
                    error = %e.message,
                    "Model request failed"
                );
            }
        }
    }
}

#[async_trait]
impl<S: ModelService> ModelService for LoggingService<S> {
    async fn complete_chat(
        &self,
        history: &[Turn],
        message: &str,
        config: &ModelConfig,
    ) -> Result<ChatCompletion, ServiceError> {
        let started = Instant::now();
        let result = self.inner.complete_chat(history, message, config).await;
        if let Ok(completion) = &result {
            tracing::debug!(
                input_tokens = completion.usage.input_tokens,
                output_tokens = completion.usage.output_tokens,
                "Chat usage"
            );
        }
        self.log_outcome("complete_chat", started, &result);
        result
    }

    async fn complete_with_tools(
        &self,
        history: &[Turn],
        message: &str,
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ServiceError> {
        let started = Instant::now();
        let result = self.inner.complete_with_tools(history, message, tools).await;
        self.log_outcome("complete_with_tools", started, &result);
        result
    }

    async fn submit_tool_result(
        &self,
        history: &[Turn],
        tool_name: &str,
        result: &Value,
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ServiceError> {
        let started = Instant::now();
        let outcome = self
            .inner
            .submit_tool_result(history, tool_name, result, tools)
            .await;
        self.log_outcome("submit_tool_result", started, &outcome);
        outcome
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let started = Instant::now();
        let result = self.inner.embed(text).await;
        if let Ok(values) = &result {
            tracing::debug!(dimension = values.len(), "Embedding generated");
        }
        self.log_outcome("embed", started, &result);
        result
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
