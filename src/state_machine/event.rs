//! Events that drive the interaction loop

use super::state::RequestId;
use crate::llm::{ModelResponse, ServiceError};
use crate::tools::{Scenario, ToolDescriptor};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Start {
        prompt: String,
        tools: Vec<ToolDescriptor>,
    },
    SendReply {
        text: String,
        tools: Vec<ToolDescriptor>,
    },
    /// Replace the mocked result with a canned record
    ApplyPreset {
        scenario: Scenario,
    },
    /// Replace the mocked result text verbatim
    EditDraft {
        draft: String,
    },
    SubmitToolResult {
        raw: String,
        tools: Vec<ToolDescriptor>,
    },
    Reset,

    // Model service events
    ModelReplied {
        request_id: RequestId,
        response: ModelResponse,
    },
    ModelFailed {
        request_id: RequestId,
        error: ServiceError,
    },
}

impl Event {
    /// Request this event answers, for service completions
    pub fn answers(&self) -> Option<RequestId> {
        match self {
            Event::ModelReplied { request_id, .. } | Event::ModelFailed { request_id, .. } => {
                Some(*request_id)
            }
            _ => None,
        }
    }
}
