//! Property-based tests for the Gemini translation layer
//!
//! These tests verify that translation between our turn types and the wire
//! format preserves key invariants:
//! - Every turn becomes exactly one content entry, in order
//! - Roles map onto the two wire roles
//! - Normalized text responses are never empty
//! - Tool calls survive normalization unchanged

use super::gemini::{self, GeminiPart};
use super::types::{ModelReply, Role, ToolCall, Turn};
use crate::config::ModelConfig;
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Strategies
// ============================================================================

fn arb_json_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(|n| Value::Number(n.into())),
        "[a-zA-Z0-9 ]{0,30}".prop_map(Value::String),
    ]
}

fn arb_object() -> impl Strategy<Value = Value> {
    proptest::collection::btree_map("[a-z][a-zA-Z]{0,9}", arb_json_value(), 0..5)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

fn arb_turn() -> impl Strategy<Value = Turn> {
    prop_oneof![
        "[a-zA-Z0-9 ?!.]{1,60}".prop_map(Turn::user),
        "[a-zA-Z0-9 ?!.]{1,60}".prop_map(Turn::model),
        ("[a-z][a-zA-Z]{2,15}", arb_object())
            .prop_map(|(name, args)| Turn::tool_call(ToolCall::new(name, args))),
        ("[a-z][a-zA-Z]{2,15}", arb_object())
            .prop_map(|(name, result)| Turn::tool_result(name, result)),
    ]
}

fn arb_history() -> impl Strategy<Value = Vec<Turn>> {
    proptest::collection::vec(arb_turn(), 0..12)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn chat_contents_are_history_plus_message(history in arb_history(), message in "[a-zA-Z ]{1,40}") {
        let request = gemini::chat_request(&history, &message, &ModelConfig::default());
        prop_assert_eq!(request.contents.len(), history.len() + 1);

        let last = request.contents.last().unwrap();
        prop_assert_eq!(last.role.as_deref(), Some("user"));
        match &last.parts[0] {
            GeminiPart::Text { text } => prop_assert_eq!(text, &message),
            other => prop_assert!(false, "expected text part, got {:?}", other),
        }
    }

    #[test]
    fn roles_map_to_wire_roles(turn in arb_turn()) {
        let content = gemini::translate_turn(&turn);
        let expected = match turn.role {
            Role::Model => "model",
            Role::User | Role::Tool => "user",
        };
        prop_assert_eq!(content.role.as_deref(), Some(expected));
        prop_assert_eq!(content.parts.len(), 1);
    }

    #[test]
    fn tool_result_request_ends_with_function_response(
        history in arb_history(),
        name in "[a-z][a-zA-Z]{2,15}",
        result in arb_object(),
    ) {
        let request = gemini::tool_result_request(&history, &name, &result, &[]);
        prop_assert_eq!(request.contents.len(), history.len() + 1);
        match &request.contents.last().unwrap().parts[0] {
            GeminiPart::FunctionResponse { function_response } => {
                prop_assert_eq!(&function_response.name, &name);
                prop_assert_eq!(&function_response.response, &json!({ "result": result }));
            }
            other => prop_assert!(false, "expected function response, got {:?}", other),
        }
    }

    #[test]
    fn normalized_text_is_never_empty(texts in proptest::collection::vec("[a-z ]{0,5}", 0..4)) {
        let parts: Vec<Value> = texts.iter().map(|t| json!({ "text": t })).collect();
        let raw = json!({ "candidates": [{ "content": { "parts": parts } }] });
        match gemini::normalize_response(&raw) {
            Ok((ModelReply::Text(text), _)) => {
                prop_assert!(!text.is_empty());
                prop_assert_eq!(text, texts.concat());
            }
            Ok((other, _)) => prop_assert!(false, "unexpected reply {:?}", other),
            Err(_) => prop_assert!(texts.concat().is_empty()),
        }
    }

    #[test]
    fn tool_calls_survive_normalization(name in "[a-z][a-zA-Z]{2,15}", args in arb_object()) {
        let raw = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Let me check." },
                { "functionCall": { "name": name, "args": args } }
            ]}}]
        });
        let (reply, _) = gemini::normalize_response(&raw).unwrap();
        prop_assert_eq!(reply, ModelReply::ToolCall(ToolCall::new(name, args)));
    }
}
