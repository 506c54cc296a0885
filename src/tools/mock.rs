//! Canned tool results for driving the loop by hand

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Which flavour of mocked result to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// A plausible normal result
    #[default]
    Success,
    /// Domain-level soft failure (out of stock, SMTP timeout)
    Failure,
    /// Validation or lookup failure
    Error,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Success, Scenario::Failure, Scenario::Error];

    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Success => "success",
            Scenario::Failure => "failure",
            Scenario::Error => "error",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" | "ok" => Ok(Scenario::Success),
            "failure" | "fail" => Ok(Scenario::Failure),
            "error" | "err" => Ok(Scenario::Error),
            other => Err(format!(
                "unknown scenario `{other}` (expected success, failure or error)"
            )),
        }
    }
}

/// Deterministic mocked result for a tool call
pub fn canned_response(tool_name: &str, args: &Value, scenario: Scenario) -> Value {
    match tool_name {
        "getNvidiaGpuPrice" => {
            let model_name = args
                .get("modelName")
                .and_then(Value::as_str)
                .unwrap_or("Unknown GPU");
            match scenario {
                Scenario::Success => json!({
                    "model": model_name,
                    "price": 1599,
                    "currency": "USD",
                    "availability": "In Stock",
                    "source": "MockDatabase_v2"
                }),
                Scenario::Failure => json!({
                    "model": model_name,
                    "availability": "Out of Stock",
                    "restockDate": "2025-01-01"
                }),
                Scenario::Error => json!({
                    "error": "InvalidModel",
                    "message": format!("GPU '{model_name}' not found.")
                }),
            }
        }
        "sendEmail" => match scenario {
            Scenario::Success => json!({
                "success": true,
                "messageId": "smtp_12345",
                "status": "queued"
            }),
            Scenario::Failure => json!({
                "success": false,
                "error": "Timeout",
                "details": "SMTP server unavailable"
            }),
            Scenario::Error => json!({
                "success": false,
                "error": "Validation",
                "details": "Invalid email format"
            }),
        },
        _ => json!({ "info": "Generic mock response. You can edit this JSON manually." }),
    }
}

/// Pretty-printed canned result, as shown in the result editor
pub fn canned_draft(tool_name: &str, args: &Value, scenario: Scenario) -> String {
    let value = canned_response(tool_name, args, scenario);
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}
