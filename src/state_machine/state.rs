//! Interaction state types

use crate::llm::{Exchange, ToolCall, Turn, Usage};
use serde::{Deserialize, Serialize};

/// Sequence number identifying one model request
pub type RequestId = u64;

/// The tool call awaiting a simulated result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCall {
    pub call: ToolCall,
    /// Editable mock result text, pre-filled from the canned table
    pub draft: String,
}

/// Where the interaction loop currently is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Phase {
    /// Nothing sent yet
    #[default]
    Idle,

    /// Request in flight; `outgoing` is committed only with the reply
    AwaitingModel {
        request_id: RequestId,
        outgoing: Turn,
    },

    /// Model asked for a tool; user supplies the mocked result
    AwaitingToolResult { pending: PendingCall },

    /// Model answered with text; user may reply
    AwaitingUserReply,

    /// Unrecoverable error; only reset leaves this state
    Finished { error: String },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingModel { .. } => "awaiting_model",
            Phase::AwaitingToolResult { .. } => "awaiting_tool_result",
            Phase::AwaitingUserReply => "awaiting_user_reply",
            Phase::Finished { .. } => "finished",
        }
    }
}

/// Complete interaction state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoopState {
    pub phase: Phase,
    /// Accepted turns, append-only until reset
    pub history: Vec<Turn>,
    /// Id for the next request; never rewinds, not even on reset
    pub next_request_id: RequestId,
    /// Raw JSON of the most recent accepted request and response
    #[serde(default)]
    pub last_exchange: Option<Exchange>,
    /// Token totals over accepted responses
    #[serde(default)]
    pub usage: Usage,
}

impl LoopState {
    /// Check if a model request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::AwaitingModel { .. })
    }

    pub fn in_flight_request(&self) -> Option<RequestId> {
        match &self.phase {
            Phase::AwaitingModel { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }

    pub fn pending_call(&self) -> Option<&PendingCall> {
        match &self.phase {
            Phase::AwaitingToolResult { pending } => Some(pending),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Finished { error } => Some(error),
            _ => None,
        }
    }
}
