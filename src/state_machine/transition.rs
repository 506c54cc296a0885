//! Pure state transition function

use super::state::{LoopState, PendingCall, Phase, RequestId};
use super::{Effect, Event, ModelCall};
use crate::llm::{ModelReply, ModelResponse, ServiceError, Turn, Usage};
use crate::tools::mock::canned_draft;
use crate::tools::{Scenario, ToolDescriptor};
use serde_json::Value;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: LoopState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: LoopState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
///
/// A rejected transition leaves the state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A model request is already in flight; wait for it to finish")]
    Busy,
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(state: &LoopState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (&state.phase, event) {
        // ============================================================
        // Reset is accepted everywhere
        // ============================================================
        (_, Event::Reset) => Ok(TransitionResult::new(LoopState {
            next_request_id: state.next_request_id,
            ..LoopState::default()
        })
        .with_effect(Effect::NotifyStateChange)),

        // ============================================================
        // Model completions
        // ============================================================

        // Reply for the in-flight request -> commit outgoing turn and reply
        (
            Phase::AwaitingModel {
                request_id,
                outgoing,
            },
            Event::ModelReplied {
                request_id: answered,
                response,
            },
        ) if *request_id == answered => {
            if is_blank_text(&response.reply) {
                return Ok(finish(state, ServiceError::empty_response().to_string()));
            }
            Ok(accept_reply(state, outgoing, response))
        }

        // Failure for the in-flight request -> Finished, history untouched
        (
            Phase::AwaitingModel { request_id, .. },
            Event::ModelFailed {
                request_id: answered,
                error,
            },
        ) if *request_id == answered => Ok(finish(state, error.to_string())),

        // Stale completion (reset happened, or a newer request superseded it) -> discard
        (_, Event::ModelReplied { .. } | Event::ModelFailed { .. }) => {
            Ok(TransitionResult::new(state.clone()))
        }

        // ============================================================
        // One request at a time
        // ============================================================
        (
            Phase::AwaitingModel { .. },
            Event::Start { .. }
            | Event::SendReply { .. }
            | Event::SubmitToolResult { .. }
            | Event::ApplyPreset { .. }
            | Event::EditDraft { .. },
        ) => Err(TransitionError::Busy),

        // ============================================================
        // User input
        // ============================================================
        (Phase::Idle, Event::Start { prompt, tools }) => {
            require_text(&prompt, "prompt")?;
            Ok(issue_message(state, prompt, tools))
        }

        (Phase::AwaitingUserReply, Event::SendReply { text, tools }) => {
            require_text(&text, "reply")?;
            Ok(issue_message(state, text, tools))
        }

        (Phase::AwaitingToolResult { pending }, Event::ApplyPreset { scenario }) => {
            let draft = canned_draft(&pending.call.name, &pending.call.arguments, scenario);
            Ok(with_draft(state, pending, draft))
        }

        (Phase::AwaitingToolResult { pending }, Event::EditDraft { draft }) => {
            Ok(with_draft(state, pending, draft))
        }

        (Phase::AwaitingToolResult { pending }, Event::SubmitToolResult { raw, tools }) => {
            let result = parse_tool_result(&raw)?;
            let request_id = state.next_request_id;
            let tool_name = pending.call.name.clone();
            let outgoing = Turn::tool_result(tool_name.clone(), result.clone());

            Ok(TransitionResult::new(LoopState {
                phase: Phase::AwaitingModel {
                    request_id,
                    outgoing,
                },
                next_request_id: request_id + 1,
                ..state.clone()
            })
            .with_effect(Effect::NotifyStateChange)
            .with_effect(Effect::request_model(
                request_id,
                ModelCall::ToolResult {
                    history: state.history.clone(),
                    tool_name,
                    result,
                    tools,
                },
            )))
        }

        (Phase::Finished { .. }, event) => Err(TransitionError::InvalidTransition(format!(
            "conversation has finished; reset before {}",
            describe(&event)
        ))),

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "cannot {} while {}",
            describe(&event),
            phase.name()
        ))),
    }
}

// Helper functions

fn require_text(text: &str, what: &str) -> Result<(), TransitionError> {
    if text.trim().is_empty() {
        return Err(TransitionError::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}

/// Mocked results must be structurally valid JSON objects
fn parse_tool_result(raw: &str) -> Result<Value, TransitionError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| TransitionError::Validation(format!("tool result is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(TransitionError::Validation(
            "tool result must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

fn issue_message(state: &LoopState, text: String, tools: Vec<ToolDescriptor>) -> TransitionResult {
    let request_id: RequestId = state.next_request_id;
    TransitionResult::new(LoopState {
        phase: Phase::AwaitingModel {
            request_id,
            outgoing: Turn::user(text.clone()),
        },
        next_request_id: request_id + 1,
        ..state.clone()
    })
    .with_effect(Effect::NotifyStateChange)
    .with_effect(Effect::request_model(
        request_id,
        ModelCall::Message {
            history: state.history.clone(),
            message: text,
            tools,
        },
    ))
}

fn accept_reply(state: &LoopState, outgoing: &Turn, response: ModelResponse) -> TransitionResult {
    let mut history = state.history.clone();
    history.push(outgoing.clone());

    let (reply_turn, phase) = match response.reply {
        ModelReply::ToolCall(call) => {
            let draft = canned_draft(&call.name, &call.arguments, Scenario::Success);
            let turn = Turn::tool_call(call.clone());
            (
                turn,
                Phase::AwaitingToolResult {
                    pending: PendingCall { call, draft },
                },
            )
        }
        ModelReply::Text(text) => (Turn::model(text), Phase::AwaitingUserReply),
    };
    history.push(reply_turn.clone());

    let outgoing_index = history.len() - 2;
    let reply_index = history.len() - 1;

    TransitionResult::new(LoopState {
        phase,
        history,
        next_request_id: state.next_request_id,
        last_exchange: Some(response.exchange),
        usage: Usage {
            input_tokens: state.usage.input_tokens + response.usage.input_tokens,
            output_tokens: state.usage.output_tokens + response.usage.output_tokens,
        },
    })
    .with_effects([
        Effect::notify_turn(outgoing_index, outgoing.clone()),
        Effect::notify_turn(reply_index, reply_turn),
        Effect::NotifyStateChange,
    ])
}

/// A text reply with nothing but whitespace is not usable content
fn is_blank_text(reply: &ModelReply) -> bool {
    matches!(reply, ModelReply::Text(text) if text.trim().is_empty())
}

/// Stop with `message`; history is left as it was before the call
fn finish(state: &LoopState, message: String) -> TransitionResult {
    TransitionResult::new(LoopState {
        phase: Phase::Finished {
            error: message.clone(),
        },
        ..state.clone()
    })
    .with_effect(Effect::notify_failure(message))
    .with_effect(Effect::NotifyStateChange)
}

fn with_draft(state: &LoopState, pending: &PendingCall, draft: String) -> TransitionResult {
    TransitionResult::new(LoopState {
        phase: Phase::AwaitingToolResult {
            pending: PendingCall {
                call: pending.call.clone(),
                draft,
            },
        },
        ..state.clone()
    })
    .with_effect(Effect::NotifyStateChange)
}

fn describe(event: &Event) -> &'static str {
    match event {
        Event::Start { .. } => "start a conversation",
        Event::SendReply { .. } => "send a reply",
        Event::ApplyPreset { .. } => "apply a preset",
        Event::EditDraft { .. } => "edit the tool result",
        Event::SubmitToolResult { .. } => "submit a tool result",
        Event::Reset => "reset",
        Event::ModelReplied { .. } | Event::ModelFailed { .. } => "accept a model response",
    }
}
