//! Google Gemini provider implementation

use super::types::{
    ChatCompletion, Exchange, ModelReply, ModelResponse, Role, ToolCall, Turn, TurnPayload, Usage,
};
use super::{ModelService, ServiceError};
use crate::config::{ModelConfig, ServiceConfig};
use crate::tools::{ParameterSchema, ToolDescriptor};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Temperature for the first tool-selection step
const TOOL_SELECTION_TEMPERATURE: f64 = 0.1;

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

impl GeminiService {
    pub fn new(api_key: impl Into<String>, config: &ServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.chat_model)
    }

    fn embed_url(&self) -> String {
        format!("{}/models/{}:embedContent", self.base_url, self.embedding_model)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ServiceError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    ServiceError::network(format!("Connection failed: {e}"))
                } else {
                    ServiceError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_http_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ServiceError::invalid_response(format!("Failed to parse response: {e} - body: {body}"))
        })
    }

    async fn generate(&self, request: &GeminiRequest) -> Result<ModelResponse, ServiceError> {
        let request = serde_json::to_value(request)
            .map_err(|e| ServiceError::invalid_request(format!("Failed to encode request: {e}")))?;
        let response = self.post_json(&self.generate_url(), &request).await?;
        let (reply, usage) = normalize_response(&response)?;
        Ok(ModelResponse {
            reply,
            usage,
            exchange: Exchange { request, response },
        })
    }
}

#[async_trait]
impl ModelService for GeminiService {
    async fn complete_chat(
        &self,
        history: &[Turn],
        message: &str,
        config: &ModelConfig,
    ) -> Result<ChatCompletion, ServiceError> {
        let ModelResponse {
            reply,
            usage,
            exchange,
        } = self.generate(&chat_request(history, message, config)).await?;
        match reply {
            ModelReply::Text(text) => Ok(ChatCompletion {
                text,
                usage,
                exchange,
            }),
            ModelReply::ToolCall(call) => Err(ServiceError::invalid_response(format!(
                "Unexpected tool call `{}` in a chat without tools",
                call.name
            ))),
        }
    }

    async fn complete_with_tools(
        &self,
        history: &[Turn],
        message: &str,
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ServiceError> {
        self.generate(&tools_request(history, message, tools)).await
    }

    async fn submit_tool_result(
        &self,
        history: &[Turn],
        tool_name: &str,
        result: &Value,
        tools: &[ToolDescriptor],
    ) -> Result<ModelResponse, ServiceError> {
        self.generate(&tool_result_request(history, tool_name, result, tools))
            .await
            .map_err(|e| e.context("Error sending tool response"))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let request = json!({
            "model": format!("models/{}", self.embedding_model),
            "content": { "parts": [{ "text": text }] }
        });
        let response = self.post_json(&self.embed_url(), &request).await?;
        extract_embedding(&response)
    }

    fn model_id(&self) -> &str {
        &self.chat_model
    }
}

// ============================================================================
// Request translation
// ============================================================================

pub(super) fn translate_turn(turn: &Turn) -> GeminiContent {
    let role = match turn.role {
        Role::User | Role::Tool => "user",
        Role::Model => "model",
    };
    let part = match &turn.payload {
        TurnPayload::Text { text } => GeminiPart::Text { text: text.clone() },
        TurnPayload::ToolCall { name, arguments } => GeminiPart::FunctionCall {
            function_call: GeminiFunctionCall {
                name: name.clone(),
                args: arguments.clone(),
            },
        },
        TurnPayload::ToolResult { name, result } => GeminiPart::FunctionResponse {
            function_response: GeminiFunctionResponse {
                name: name.clone(),
                response: json!({ "result": result }),
            },
        },
    };
    GeminiContent {
        role: Some(role.to_string()),
        parts: vec![part],
    }
}

fn contents_with(history: &[Turn], next: &Turn) -> Vec<GeminiContent> {
    history
        .iter()
        .chain(std::iter::once(next))
        .map(translate_turn)
        .collect()
}

fn translate_tools(tools: &[ToolDescriptor]) -> Option<Vec<GeminiTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(vec![GeminiTool {
        function_declarations: tools
            .iter()
            .map(|t| GeminiFunctionDeclaration {
                name: t.name.clone(),
                description: t.description().to_string(),
                parameters: t.parameters.clone(),
            })
            .collect(),
    }])
}

pub(super) fn chat_request(history: &[Turn], message: &str, config: &ModelConfig) -> GeminiRequest {
    let system_instruction = if config.system_instruction.trim().is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text {
                text: config.system_instruction.clone(),
            }],
        })
    };

    GeminiRequest {
        contents: contents_with(history, &Turn::user(message)),
        system_instruction,
        tools: None,
        generation_config: Some(GeminiGenerationConfig {
            temperature: Some(config.temperature),
            top_k: Some(config.top_k),
            top_p: Some(config.top_p),
            max_output_tokens: Some(config.max_output_tokens),
        }),
    }
}

pub(super) fn tools_request(
    history: &[Turn],
    message: &str,
    tools: &[ToolDescriptor],
) -> GeminiRequest {
    GeminiRequest {
        contents: contents_with(history, &Turn::user(message)),
        system_instruction: None,
        tools: translate_tools(tools),
        generation_config: Some(GeminiGenerationConfig {
            temperature: Some(TOOL_SELECTION_TEMPERATURE),
            ..GeminiGenerationConfig::default()
        }),
    }
}

pub(super) fn tool_result_request(
    history: &[Turn],
    tool_name: &str,
    result: &Value,
    tools: &[ToolDescriptor],
) -> GeminiRequest {
    GeminiRequest {
        contents: contents_with(history, &Turn::tool_result(tool_name, result.clone())),
        system_instruction: None,
        // Tools stay attached so the model can chain calls
        tools: translate_tools(tools),
        generation_config: None,
    }
}

// ============================================================================
// Response normalization
// ============================================================================

pub(super) fn normalize_response(raw: &Value) -> Result<(ModelReply, Usage), ServiceError> {
    let response: GeminiResponse = serde_json::from_value(raw.clone())
        .map_err(|e| ServiceError::invalid_response(format!("Unexpected response shape: {e}")))?;

    let usage = response
        .usage_metadata
        .map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(ServiceError::empty_response)?;

    let finish_reason = candidate.finish_reason;
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    if let Some(call) = parts.iter().find_map(|p| p.function_call.clone()) {
        if call.name.trim().is_empty() {
            return Err(ServiceError::invalid_response(
                "Tool call with an empty function name",
            ));
        }
        let arguments = if call.args.is_null() {
            json!({})
        } else {
            call.args
        };
        return Ok((ModelReply::ToolCall(ToolCall::new(call.name, arguments)), usage));
    }

    let text: String = parts
        .iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        return Err(match finish_reason.as_deref() {
            Some(reason) if reason != "STOP" => ServiceError::new(
                super::ServiceErrorKind::EmptyResponse,
                format!("Empty response from model (finish reason: {reason})."),
            ),
            _ => ServiceError::empty_response(),
        });
    }

    Ok((ModelReply::Text(text), usage))
}

pub(super) fn extract_embedding(raw: &Value) -> Result<Vec<f32>, ServiceError> {
    let response: GeminiEmbedResponse = serde_json::from_value(raw.clone())
        .map_err(|e| ServiceError::invalid_response(format!("Unexpected embedding shape: {e}")))?;
    if response.embedding.values.is_empty() {
        return Err(ServiceError::empty_response());
    }
    Ok(response.embedding.values)
}

/// Kind comes from the status alone; the message from the body when it parses
pub(super) fn classify_http_error(status: u16, body: &str) -> ServiceError {
    let message = serde_json::from_str::<GeminiErrorResponse>(body)
        .map_or_else(|_| body.to_string(), |r| r.error.message);
    match status {
        400 => ServiceError::invalid_request(format!("Invalid request: {message}")),
        401 | 403 => ServiceError::auth(format!("Authentication failed: {message}")),
        429 => ServiceError::rate_limit(format!("Rate limit exceeded: {message}")),
        500..=599 => ServiceError::server_error(format!("Server error: {message}")),
        _ => ServiceError::unknown(format!("HTTP {status} error: {message}")),
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GeminiRequest {
    pub(super) contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
pub(super) struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) role: Option<String>,
    pub(super) parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct GeminiFunctionCall {
    pub(super) name: String,
    #[serde(default)]
    pub(super) args: Value,
}

#[derive(Debug, Serialize)]
pub(super) struct GeminiFunctionResponse {
    pub(super) name: String,
    pub(super) response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GeminiTool {
    pub(super) function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
pub(super) struct GeminiFunctionDeclaration {
    pub(super) name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(super) description: String,
    pub(super) parameters: ParameterSchema,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedResponse {
    embedding: GeminiEmbedding,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
