//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use crate::config::ModelConfig;
use crate::llm::{
    ChatCompletion, Exchange, ModelResponse, ModelService, ServiceError, Turn, Usage,
};
use crate::tools::ToolDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// A call the mock received
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Chat {
        history: Vec<Turn>,
        message: String,
        config: ModelConfig,
    },
    Message {
        history: Vec<Turn>,
        message: String,
        tool_names: Vec<String>,
    },
    ToolResult {
        history: Vec<Turn>,
        tool_name: String,
        result: Value,
    },
    Embed {
        text: String,
    },
}

// ============================================================================
// Mock Model Service
// ============================================================================

/// Mock model service that returns queued responses
pub struct MockModelService {
    responses: Mutex<VecDeque<Result<ModelResponse, ServiceError>>>,
    chats: Mutex<VecDeque<Result<String, ServiceError>>>,
    embeddings: Mutex<VecDeque<Result<Vec<f32>, ServiceError>>>,
    /// Record of all calls made
    calls: Mutex<Vec<RecordedCall>>,
    /// When set, every call holds until a permit is released
    gate: Option<Arc<Semaphore>>,
}

impl MockModelService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            chats: Mutex::new(VecDeque::new()),
            embeddings: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Calls block until `gate` hands out a permit
    ///
    /// The response is chosen when the call arrives, not when it is released.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    /// Queue a response for the tool-enabled calls
    pub fn queue_response(&self, response: ModelResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: ServiceError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Queue a plain chat reply
    pub fn queue_chat(&self, text: impl Into<String>) {
        self.chats.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn queue_chat_error(&self, error: ServiceError) {
        self.chats.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_embedding(&self, values: Vec<f32>) {
        self.embeddings.lock().unwrap().push_back(Ok(values));
    }

    pub fn queue_embedding_error(&self, error: ServiceError) {
        self.embeddings.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded calls
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `count` calls have arrived
    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls.lock().unwrap().len() < count {
            tokio::task::yield_now().await;
        }
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
    }

    fn next_response(&self) -> Result<ModelResponse, ServiceError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::network("No mock response queued")))
    }
}

impl Default for MockModelService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelService for MockModelService {
    async fn complete_chat(
        &self,
        history: &[Turn],
        message: &str,
        config: &ModelConfig,
    ) -> Result<ChatCompletion, ServiceError> {
        self.calls.lock().unwrap().push(RecordedCall::Chat {
            history: history.to_vec(),
            message: message.to_string(),
            config: config.clone(),
        });
        let reply = self
            .chats
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::network("No mock chat queued")));
        self.pass_gate().await;
        reply.map(|text| ChatCompletion {
            usage: Usage {
                input_tokens: message.len() as u64,
                output_tokens: text.len() as u64,
            },
            exchange: Exchange {
                request: serde_json::json!({ "message": message }),
                response: serde_json::json!({ "text": text }),
            },
            text,
        })
    }

    async fn complete_with_tools(
        &self,
        history: &[Turn],
        message: &str,
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ServiceError> {
        let response = {
            self.calls.lock().unwrap().push(RecordedCall::Message {
                history: history.to_vec(),
                message: message.to_string(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            });
            self.next_response()
        };
        self.pass_gate().await;
        response
    }

    async fn submit_tool_result(
        &self,
        history: &[Turn],
        tool_name: &str,
        result: &Value,
        _tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ServiceError> {
        let response = {
            self.calls.lock().unwrap().push(RecordedCall::ToolResult {
                history: history.to_vec(),
                tool_name: tool_name.to_string(),
                result: result.clone(),
            });
            self.next_response()
        };
        self.pass_gate().await;
        response
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        self.calls.lock().unwrap().push(RecordedCall::Embed {
            text: text.to_string(),
        });
        let values = self
            .embeddings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::network("No mock embedding queued")));
        self.pass_gate().await;
        values
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Exchange, ServiceErrorKind, Usage};
    use crate::runtime::{spawn_loop, Command, CommandError, SessionEvent};
    use crate::state_machine::{Phase, TransitionError};
    use crate::tools::{Scenario, DEFAULT_TOOL_DEFINITIONS};
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_model_service() {
        let mock = MockModelService::new();
        mock.queue_response(ModelResponse::text("Hello"));

        let response = mock.complete_with_tools(&[], "hi", &[]).await.unwrap();
        assert_eq!(response, ModelResponse::text("Hello"));

        // Second call should fail (no more responses)
        let result = mock.complete_with_tools(&[], "hi", &[]).await;
        assert_eq!(result.unwrap_err().kind, ServiceErrorKind::Network);
        assert_eq!(mock.recorded_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_gpu_price_walkthrough() {
        let mock = Arc::new(MockModelService::new());
        mock.queue_response(ModelResponse::tool_call(
            "getNvidiaGpuPrice",
            json!({ "modelName": "RTX 5090" }),
        ));
        mock.queue_response(ModelResponse::text("The RTX 5090 costs $1599."));
        let handle = spawn_loop(mock.clone(), DEFAULT_TOOL_DEFINITIONS);

        handle
            .dispatch(Command::Start {
                prompt: "Check the price of RTX 5090".to_string(),
            })
            .await
            .unwrap();
        let state = handle.settled().await.unwrap();
        let pending = state.pending_call().unwrap().clone();
        assert_eq!(pending.call.arguments, json!({ "modelName": "RTX 5090" }));

        handle
            .dispatch(Command::SubmitResult { raw: pending.draft })
            .await
            .unwrap();
        let state = handle.settled().await.unwrap();

        assert_eq!(state.phase, Phase::AwaitingUserReply);
        assert_eq!(state.history.len(), 4);
        assert_eq!(
            state.history[3],
            Turn::model("The RTX 5090 costs $1599.")
        );

        let calls = mock.recorded_calls();
        assert_eq!(calls.len(), 2);
        let RecordedCall::Message { history, tool_names, .. } = &calls[0] else {
            panic!("expected message call, got {:?}", calls[0]);
        };
        assert!(history.is_empty());
        assert_eq!(tool_names, &["getNvidiaGpuPrice", "sendEmail"]);
        let RecordedCall::ToolResult { history, result, .. } = &calls[1] else {
            panic!("expected tool result call, got {:?}", calls[1]);
        };
        assert_eq!(history.len(), 2);
        assert_eq!(result["price"], 1599);
    }

    #[tokio::test]
    async fn test_invalid_tool_definitions_reject_start() {
        let mock = Arc::new(MockModelService::new());
        let handle = spawn_loop(mock.clone(), "[{ not json");

        let result = handle
            .dispatch(Command::Start {
                prompt: "hello".to_string(),
            })
            .await;
        assert!(matches!(result, Err(CommandError::ToolDefinitions(_))));
        assert_eq!(handle.snapshot().phase, Phase::Idle);
        assert!(mock.recorded_calls().is_empty());

        handle
            .dispatch(Command::SetToolDefinitions {
                raw: DEFAULT_TOOL_DEFINITIONS.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(handle.tool_definitions(), DEFAULT_TOOL_DEFINITIONS);
    }

    #[tokio::test]
    async fn test_set_invalid_definitions_keeps_previous() {
        let handle = spawn_loop(Arc::new(MockModelService::new()), DEFAULT_TOOL_DEFINITIONS);
        let result = handle
            .dispatch(Command::SetToolDefinitions {
                raw: "{\"name\": \"x\"}".to_string(),
            })
            .await;
        assert!(matches!(result, Err(CommandError::ToolDefinitions(_))));
        assert_eq!(handle.tool_definitions(), DEFAULT_TOOL_DEFINITIONS);
    }

    #[tokio::test]
    async fn test_busy_rejects_second_command() {
        let gate = Arc::new(Semaphore::new(0));
        let mock = Arc::new(MockModelService::gated(gate.clone()));
        mock.queue_response(ModelResponse::text("done"));
        let handle = spawn_loop(mock.clone(), DEFAULT_TOOL_DEFINITIONS);

        handle
            .dispatch(Command::Start {
                prompt: "first".to_string(),
            })
            .await
            .unwrap();
        assert!(handle.snapshot().is_busy());

        let result = handle
            .dispatch(Command::Reply {
                text: "second".to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(CommandError::Rejected(TransitionError::Busy))
        ));

        gate.add_permits(1);
        let state = handle.settled().await.unwrap();
        assert_eq!(state.history, vec![Turn::user("first"), Turn::model("done")]);
        assert_eq!(mock.recorded_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_reply_after_reset_is_discarded() {
        let gate = Arc::new(Semaphore::new(0));
        let mock = Arc::new(MockModelService::gated(gate.clone()));
        mock.queue_response(ModelResponse::text("late"));
        mock.queue_response(ModelResponse::text("fresh"));
        let handle = spawn_loop(mock.clone(), DEFAULT_TOOL_DEFINITIONS);

        handle
            .dispatch(Command::Start {
                prompt: "first".to_string(),
            })
            .await
            .unwrap();
        mock.wait_for_calls(1).await;
        handle.dispatch(Command::Reset).await.unwrap();
        assert_eq!(handle.snapshot().phase, Phase::Idle);

        handle
            .dispatch(Command::Start {
                prompt: "second".to_string(),
            })
            .await
            .unwrap();
        mock.wait_for_calls(2).await;

        gate.add_permits(2);
        let state = handle.settled().await.unwrap();
        assert_eq!(
            state.history,
            vec![Turn::user("second"), Turn::model("fresh")]
        );
    }

    #[tokio::test]
    async fn test_failure_finishes_until_reset() {
        let mock = Arc::new(MockModelService::new());
        mock.queue_error(ServiceError::empty_response());
        let handle = spawn_loop(mock, DEFAULT_TOOL_DEFINITIONS);
        let mut events = handle.subscribe();

        handle
            .dispatch(Command::Start {
                prompt: "hello".to_string(),
            })
            .await
            .unwrap();
        let state = handle.settled().await.unwrap();
        assert_eq!(state.error(), Some("Empty response from model."));
        assert!(state.history.is_empty());

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Failed { message } = event {
                assert_eq!(message, "Empty response from model.");
                saw_failure = true;
            }
        }
        assert!(saw_failure);

        let result = handle
            .dispatch(Command::Start {
                prompt: "again".to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(CommandError::Rejected(TransitionError::InvalidTransition(_)))
        ));

        handle.dispatch(Command::Reset).await.unwrap();
        assert_eq!(handle.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_turns_are_broadcast_in_order() {
        let mock = Arc::new(MockModelService::new());
        mock.queue_response(ModelResponse::tool_call(
            "sendEmail",
            json!({ "recipient": "boss@company.com" }),
        ));
        let handle = spawn_loop(mock, DEFAULT_TOOL_DEFINITIONS);
        let mut events = handle.subscribe();

        handle
            .dispatch(Command::Start {
                prompt: "Email my boss".to_string(),
            })
            .await
            .unwrap();
        handle.settled().await.unwrap();

        let mut indices = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::TurnAppended { index, .. } = event {
                indices.push(index);
            }
        }
        assert_eq!(indices, vec![0, 1]);

        handle
            .dispatch(Command::ApplyPreset {
                scenario: Scenario::Error,
            })
            .await
            .unwrap();
        let draft: Value =
            serde_json::from_str(&handle.snapshot().pending_call().unwrap().draft).unwrap();
        assert!(draft["error"].is_string());
    }

    #[tokio::test]
    async fn test_state_exposes_raw_exchange() {
        let mock = Arc::new(MockModelService::new());
        let exchange = Exchange {
            request: json!({ "contents": [{ "role": "user", "parts": [{ "text": "Check the price" }] }] }),
            response: json!({ "candidates": [{ "content": { "parts": [{ "text": "It is $1599." }] } }] }),
        };
        mock.queue_response(ModelResponse {
            usage: Usage {
                input_tokens: 20,
                output_tokens: 4,
            },
            exchange: exchange.clone(),
            ..ModelResponse::text("It is $1599.")
        });
        let handle = spawn_loop(mock, DEFAULT_TOOL_DEFINITIONS);

        handle
            .dispatch(Command::Start {
                prompt: "Check the price".to_string(),
            })
            .await
            .unwrap();
        let state = handle.settled().await.unwrap();
        assert_eq!(state.last_exchange, Some(exchange));
        assert_eq!(state.usage.output_tokens, 4);
    }
}
