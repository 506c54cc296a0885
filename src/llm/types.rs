//! Conversation and response types shared with the model service

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Content of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnPayload {
    Text { text: String },
    ToolCall { name: String, arguments: Value },
    ToolResult { name: String, result: Value },
}

/// One role-tagged entry in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub payload: TurnPayload,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            payload: TurnPayload::Text { text: text.into() },
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            payload: TurnPayload::Text { text: text.into() },
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            role: Role::Model,
            payload: TurnPayload::ToolCall {
                name: call.name,
                arguments: call.arguments,
            },
        }
    }

    pub fn tool_result(name: impl Into<String>, result: Value) -> Self {
        Self {
            role: Role::Tool,
            payload: TurnPayload::ToolResult {
                name: name.into(),
                result,
            },
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            TurnPayload::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Human-readable label for history listings
    pub fn label(&self) -> &'static str {
        match (self.role, &self.payload) {
            (Role::User, _) => "USER PROMPT",
            (Role::Model, TurnPayload::ToolCall { .. }) => "MODEL (TOOL REQUEST)",
            (Role::Model, _) => "MODEL (TEXT RESPONSE)",
            (Role::Tool, _) => "FUNCTION (MOCK RESULT)",
        }
    }
}

/// What a successful generation produced
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCall(ToolCall),
}

/// Token accounting reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The exact JSON sent and received, kept for display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub request: Value,
    pub response: Value,
}

/// Response to a tool-enabled generation
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub reply: ModelReply,
    pub usage: Usage,
    pub exchange: Exchange,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            reply: ModelReply::Text(text.into()),
            usage: Usage::default(),
            exchange: Exchange::default(),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            reply: ModelReply::ToolCall(ToolCall::new(name, arguments)),
            usage: Usage::default(),
            exchange: Exchange::default(),
        }
    }
}

/// Response to a plain chat generation
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub text: String,
    pub usage: Usage,
    pub exchange: Exchange,
}
