//! Tool registry
//!
//! Tool definitions are user-editable raw JSON (an array of Gemini function
//! declarations). They are parsed structurally before every request that
//! attaches them; semantic problems in a schema only surface when the model
//! service rejects the request.

pub mod mock;

pub use mock::{canned_response, Scenario};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Default definitions: a GPU price lookup and an email sender
pub const DEFAULT_TOOL_DEFINITIONS: &str = r#"[
  {
    "name": "getNvidiaGpuPrice",
    "parameters": {
      "type": "OBJECT",
      "description": "Get the current market price and availability of an Nvidia GPU.",
      "properties": {
        "modelName": {
          "type": "STRING",
          "description": "The model name of the GPU (e.g., RTX 4090, RTX 3060)."
        },
        "currency": {
          "type": "STRING",
          "description": "The currency to display the price in (e.g., USD, TWD)."
        }
      },
      "required": ["modelName"]
    }
  },
  {
    "name": "sendEmail",
    "parameters": {
      "type": "OBJECT",
      "description": "Send an email to a specific recipient.",
      "properties": {
        "recipient": {
          "type": "STRING",
          "description": "The email address of the recipient."
        },
        "subject": {
          "type": "STRING",
          "description": "The subject line of the email."
        },
        "body": {
          "type": "STRING",
          "description": "The body content of the email."
        }
      },
      "required": ["recipient", "subject", "body"]
    }
  }
]"#;

/// Errors from parsing tool definitions
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Tool definitions are not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("Tool definitions must be a JSON array of function declarations")]
    NotAnArray,
    #[error("Tool #{index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("Tool #{index} has an empty name")]
    EmptyName { index: usize },
    #[error("Tool #{index} is malformed: {source}")]
    InvalidDescriptor {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Tool name `{0}` is declared more than once")]
    DuplicateName(String),
}

/// One property in a parameter schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Anything else the user wrote (enum, items, nested properties...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parameter schema of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type", default = "object_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

fn object_kind() -> String {
    "OBJECT".to_string()
}

impl ParameterSchema {
    /// Iterate `(name, schema, required)` triples
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &PropertySchema, bool)> {
        self.properties.iter().map(|(name, schema)| {
            let required = self.required.iter().any(|r| r == name);
            (name.as_str(), schema, required)
        })
    }
}

/// A callable function the model may request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: ParameterSchema,
}

impl ToolDescriptor {
    /// Top-level description, falling back to the one inside the schema
    pub fn description(&self) -> &str {
        self.description
            .as_deref()
            .or(self.parameters.description.as_deref())
            .unwrap_or("")
    }

    /// One-line signature for display, e.g. `sendEmail(recipient*, subject*)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .parameters()
            .map(|(name, _, required)| {
                if required {
                    format!("{name}*")
                } else {
                    name.to_string()
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

/// Ordered, name-unique list of tool descriptors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Parse raw definitions text
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(raw).map_err(SchemaError::Syntax)?;
        let Value::Array(entries) = value else {
            return Err(SchemaError::NotAnArray);
        };

        let mut tools = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let Some(fields) = entry.as_object() else {
                return Err(SchemaError::MissingField {
                    index,
                    field: "name",
                });
            };
            for field in ["name", "parameters"] {
                if !fields.contains_key(field) {
                    return Err(SchemaError::MissingField { index, field });
                }
            }

            let tool: ToolDescriptor = serde_json::from_value(entry)
                .map_err(|source| SchemaError::InvalidDescriptor { index, source })?;

            if tool.name.trim().is_empty() {
                return Err(SchemaError::EmptyName { index });
            }
            if !seen.insert(tool.name.clone()) {
                return Err(SchemaError::DuplicateName(tool.name));
            }
            tools.push(tool);
        }

        Ok(Self { tools })
    }

    /// The built-in GPU/email registry
    pub fn builtin() -> Self {
        // The constant is covered by tests; an empty registry is the safe fallback.
        Self::parse(DEFAULT_TOOL_DEFINITIONS).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn as_slice(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn into_vec(self) -> Vec<ToolDescriptor> {
        self.tools
    }
}
