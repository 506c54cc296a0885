//! Effects produced by state transitions

use super::state::RequestId;
use crate::llm::Turn;
use crate::tools::ToolDescriptor;
use serde_json::Value;

/// The model service operation a request maps to
#[derive(Debug, Clone, PartialEq)]
pub enum ModelCall {
    /// `complete_with_tools`
    Message {
        history: Vec<Turn>,
        message: String,
        tools: Vec<ToolDescriptor>,
    },
    /// `submit_tool_result`
    ToolResult {
        history: Vec<Turn>,
        tool_name: String,
        result: Value,
        tools: Vec<ToolDescriptor>,
    },
}

impl ModelCall {
    /// History the request carries, excluding the new turn
    pub fn history(&self) -> &[Turn] {
        match self {
            ModelCall::Message { history, .. } | ModelCall::ToolResult { history, .. } => history,
        }
    }
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Issue a model request
    RequestModel {
        request_id: RequestId,
        call: ModelCall,
    },

    /// A turn was committed to history
    NotifyTurn { index: usize, turn: Turn },

    /// Phase changed (or the draft did)
    NotifyStateChange,

    /// The loop stopped on an error
    NotifyFailure { message: String },
}

impl Effect {
    pub fn request_model(request_id: RequestId, call: ModelCall) -> Self {
        Effect::RequestModel { request_id, call }
    }

    pub fn notify_turn(index: usize, turn: Turn) -> Self {
        Effect::NotifyTurn { index, turn }
    }

    pub fn notify_failure(message: impl Into<String>) -> Self {
        Effect::NotifyFailure {
            message: message.into(),
        }
    }
}
