//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::state::*;
use super::transition::*;
use super::*;
use crate::llm::{ModelReply, ModelResponse, ServiceError, Turn};
use crate::tools::{Scenario, ToolRegistry};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Abstract step; model completions are resolved against the current state
#[derive(Debug, Clone)]
enum Step {
    Start(String),
    Reply(String),
    Preset(Scenario),
    Edit(String),
    Submit(String),
    Reset,
    ReplyText(String),
    ReplyToolCall(String),
    Fail(String),
    Stale,
}

fn arb_scenario() -> impl Strategy<Value = Scenario> {
    prop_oneof![
        Just(Scenario::Success),
        Just(Scenario::Failure),
        Just(Scenario::Error),
    ]
}

fn arb_raw_result() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("{}".to_string()),
        Just("{\"price\": 1599}".to_string()),
        Just("{not json".to_string()),
        Just("[1, 2, 3]".to_string()),
        "[a-z ]{0,10}",
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        "[a-zA-Z ]{0,20}".prop_map(Step::Start),
        "[a-zA-Z ]{0,20}".prop_map(Step::Reply),
        arb_scenario().prop_map(Step::Preset),
        "[a-z{}\": ]{0,20}".prop_map(Step::Edit),
        arb_raw_result().prop_map(Step::Submit),
        Just(Step::Reset),
        "[a-zA-Z ]{1,20}".prop_map(Step::ReplyText),
        prop_oneof![
            Just("getNvidiaGpuPrice".to_string()),
            Just("sendEmail".to_string()),
            "[a-zA-Z]{1,12}",
        ]
        .prop_map(Step::ReplyToolCall),
        "[a-zA-Z ]{1,20}".prop_map(Step::Fail),
        Just(Step::Stale),
    ]
}

fn to_event(state: &LoopState, step: Step) -> Event {
    let tools = ToolRegistry::builtin().into_vec();
    // Completions answer the in-flight request when there is one
    let current = state
        .in_flight_request()
        .unwrap_or(state.next_request_id.wrapping_add(7));
    match step {
        Step::Start(prompt) => Event::Start { prompt, tools },
        Step::Reply(text) => Event::SendReply { text, tools },
        Step::Preset(scenario) => Event::ApplyPreset { scenario },
        Step::Edit(draft) => Event::EditDraft { draft },
        Step::Submit(raw) => Event::SubmitToolResult { raw, tools },
        Step::Reset => Event::Reset,
        Step::ReplyText(text) => Event::ModelReplied {
            request_id: current,
            response: ModelResponse::text(text),
        },
        Step::ReplyToolCall(name) => Event::ModelReplied {
            request_id: current,
            response: ModelResponse::tool_call(name, json!({ "modelName": "RTX 5090" })),
        },
        Step::Fail(message) => Event::ModelFailed {
            request_id: current,
            error: ServiceError::network(message),
        },
        Step::Stale => Event::ModelReplied {
            request_id: current.wrapping_add(1000),
            response: ModelResponse::text("late"),
        },
    }
}

fn arb_awaiting_model_state() -> impl Strategy<Value = LoopState> {
    ("[a-zA-Z ]{1,20}", 0u64..100).prop_map(|(text, request_id)| LoopState {
        phase: Phase::AwaitingModel {
            request_id,
            outgoing: Turn::user(text),
        },
        history: vec![],
        next_request_id: request_id + 1,
        ..LoopState::default()
    })
}

fn run(steps: Vec<Step>) -> Vec<(LoopState, Event, Result<TransitionResult, TransitionError>)> {
    let mut state = LoopState::default();
    let mut trace = Vec::new();
    for step in steps {
        let event = to_event(&state, step);
        let result = transition(&state, event.clone());
        let next = match &result {
            Ok(r) => r.new_state.clone(),
            Err(_) => state.clone(),
        };
        trace.push((state, event, result));
        state = next;
    }
    trace
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // History only changes by committing exactly two turns, or by reset
    #[test]
    fn prop_history_grows_by_accepted_exchanges(steps in proptest::collection::vec(arb_step(), 0..30)) {
        for (before, event, result) in run(steps) {
            let Ok(result) = result else { continue };
            let after = &result.new_state.history;
            match event {
                Event::Reset => prop_assert!(after.is_empty()),
                Event::ModelReplied { request_id, response }
                    if before.in_flight_request() == Some(request_id) =>
                {
                    if matches!(&response.reply, ModelReply::Text(text) if text.trim().is_empty()) {
                        prop_assert!(result.new_state.error().is_some());
                        prop_assert_eq!(after, &before.history);
                    } else {
                        prop_assert_eq!(after.len(), before.history.len() + 2);
                        prop_assert_eq!(&after[..before.history.len()], &before.history[..]);
                    }
                }
                _ => prop_assert_eq!(after, &before.history),
            }
        }
    }

    // Every request carries exactly the accepted history at call time
    #[test]
    fn prop_request_history_matches_state(steps in proptest::collection::vec(arb_step(), 0..30)) {
        for (before, _event, result) in run(steps) {
            let Ok(result) = result else { continue };
            for effect in &result.effects {
                if let Effect::RequestModel { request_id, call } = effect {
                    prop_assert_eq!(call.history(), &before.history[..]);
                    prop_assert_eq!(Some(*request_id), result.new_state.in_flight_request());
                    prop_assert_eq!(*request_id, before.next_request_id);
                }
            }
        }
    }

    // Request ids never rewind
    #[test]
    fn prop_request_ids_monotonic(steps in proptest::collection::vec(arb_step(), 0..30)) {
        for (before, _event, result) in run(steps) {
            if let Ok(result) = result {
                prop_assert!(result.new_state.next_request_id >= before.next_request_id);
            }
        }
    }

    // A rejected transition never issues a request
    #[test]
    fn prop_at_most_one_request_in_flight(steps in proptest::collection::vec(arb_step(), 0..30)) {
        for (before, _event, result) in run(steps) {
            let Ok(result) = result else { continue };
            let requests = result
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::RequestModel { .. }))
                .count();
            prop_assert!(requests <= 1);
            if requests == 1 {
                prop_assert!(!before.is_busy());
            }
        }
    }

    // Invalid tool result text is rejected without touching state
    #[test]
    fn prop_invalid_tool_result_rejected(raw in "[a-z ]{0,10}|\\[[0-9, ]{0,8}\\]|\\{[a-z]{1,5}") {
        let state = transition(
            &LoopState::default(),
            Event::Start { prompt: "price".to_string(), tools: vec![] },
        )
        .unwrap()
        .new_state;
        let state = transition(
            &state,
            Event::ModelReplied {
                request_id: 0,
                response: ModelResponse::tool_call("getNvidiaGpuPrice", json!({})),
            },
        )
        .unwrap()
        .new_state;

        let result = transition(&state, Event::SubmitToolResult { raw, tools: vec![] });
        prop_assert!(
            matches!(result, Err(TransitionError::Validation(_))),
            "expected validation error, got {:?}",
            result
        );
    }

    // Reset always reaches an empty idle state
    #[test]
    fn prop_reset_always_clears(steps in proptest::collection::vec(arb_step(), 0..20)) {
        let state = run(steps)
            .into_iter()
            .last()
            .map(|(before, _, result)| result.map(|r| r.new_state).unwrap_or(before))
            .unwrap_or_default();
        let result = transition(&state, Event::Reset).unwrap();
        prop_assert_eq!(result.new_state.phase, Phase::Idle);
        prop_assert!(result.new_state.history.is_empty());
        prop_assert_eq!(result.new_state.next_request_id, state.next_request_id);
    }

    // Completions for anything but the in-flight request change nothing
    #[test]
    fn prop_stale_responses_ignored(state in arb_awaiting_model_state(), offset in 1u64..50) {
        let Some(in_flight) = state.in_flight_request() else { unreachable!() };
        for event in [
            Event::ModelReplied {
                request_id: in_flight + offset,
                response: ModelResponse::text("late"),
            },
            Event::ModelFailed {
                request_id: in_flight.wrapping_sub(offset),
                error: ServiceError::network("late"),
            },
        ] {
            let result = transition(&state, event).unwrap();
            prop_assert_eq!(&result.new_state, &state);
            prop_assert!(result.effects.is_empty());
        }
    }

    // While a request is in flight every user action is Busy
    #[test]
    fn prop_busy_rejects_user_actions(state in arb_awaiting_model_state(), text in "[a-zA-Z ]{1,20}") {
        for event in [
            Event::Start { prompt: text.clone(), tools: vec![] },
            Event::SendReply { text: text.clone(), tools: vec![] },
            Event::SubmitToolResult { raw: "{}".to_string(), tools: vec![] },
            Event::EditDraft { draft: text.clone() },
        ] {
            prop_assert_eq!(transition(&state, event).unwrap_err(), TransitionError::Busy);
        }
    }

    // A reply to a tool call always leaves a parseable draft
    #[test]
    fn prop_tool_call_draft_is_json_object(name in "[a-zA-Z]{1,12}", scenario in arb_scenario()) {
        let state = LoopState {
            phase: Phase::AwaitingModel { request_id: 3, outgoing: Turn::user("go") },
            history: vec![],
            next_request_id: 4,
            ..LoopState::default()
        };
        let state = transition(
            &state,
            Event::ModelReplied { request_id: 3, response: ModelResponse::tool_call(name, json!({})) },
        )
        .unwrap()
        .new_state;
        let state = transition(&state, Event::ApplyPreset { scenario }).unwrap().new_state;
        let draft = &state.pending_call().unwrap().draft;
        let parsed: serde_json::Value = serde_json::from_str(draft).unwrap();
        prop_assert!(parsed.is_object());
    }
}
