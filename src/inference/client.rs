//! Gemini `generateContent` client.
//!
//! A round keeps the full `contents` array (user text, model function calls,
//! function responses) so each send replays the round so far. The system
//! prompt travels as `systemInstruction` and the tool list as
//! `functionDeclarations`.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;

use super::errors::InferenceError;
use super::types::{
    FunctionDeclaration, HistoryRole, HistoryTurn, ModelResponse, ToolCallRequest, TurnContent,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

// ─── Backend traits ──────────────────────────────────────────────────────────

/// A generative-language backend capable of function calling.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Supply (or replace) the API key.
    fn initialize(&self, api_key: &str);

    /// Whether a key has been supplied.
    fn is_initialized(&self) -> bool;

    /// Open a round seeded with prior turns, the system prompt, and the tools.
    async fn start_round(
        &self,
        history: Vec<HistoryTurn>,
        system_prompt: String,
        tools: Vec<FunctionDeclaration>,
    ) -> Result<Box<dyn ModelRound>, InferenceError>;
}

/// One open exchange with the model. Each send sees everything sent before it.
#[async_trait]
pub trait ModelRound: Send {
    async fn send(&mut self, content: TurnContent) -> Result<ModelResponse, InferenceError>;
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<&'a Content>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [Tool],
    generation_config: GenerationConfig,
}

fn no_tools(tools: &&[Tool]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

/// A part is text, a function call, or a function response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    /// Opaque reasoning token; must be echoed back on 2.5+ models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// ─── GeminiClient ────────────────────────────────────────────────────────────

/// Client for the Gemini generative-language API.
pub struct GeminiClient {
    http: HttpClient,
    config: ModelConfig,
    api_key: RwLock<Option<String>>,
}

impl GeminiClient {
    /// Build a client. A non-empty `config.api_key` initializes it immediately.
    pub fn new(config: ModelConfig) -> Result<Self, InferenceError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: config.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let api_key = Some(config.api_key.trim().to_string()).filter(|k| !k.is_empty());

        Ok(Self {
            http,
            config,
            api_key: RwLock::new(api_key),
        })
    }

    /// The configured model name.
    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn current_key(&self) -> Option<String> {
        match self.api_key.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ModelBackend for GeminiClient {
    fn initialize(&self, api_key: &str) {
        let key = Some(api_key.trim().to_string()).filter(|k| !k.is_empty());
        let mut guard = match self.api_key.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = key;
        tracing::info!(model = %self.config.model, initialized = guard.is_some(), "model backend key set");
    }

    fn is_initialized(&self) -> bool {
        self.current_key().is_some()
    }

    async fn start_round(
        &self,
        history: Vec<HistoryTurn>,
        system_prompt: String,
        tools: Vec<FunctionDeclaration>,
    ) -> Result<Box<dyn ModelRound>, InferenceError> {
        let api_key = self.current_key().ok_or(InferenceError::NotInitialized)?;

        Ok(Box::new(GeminiRound {
            http: self.http.clone(),
            url: self.generate_url(),
            api_key,
            timeout_secs: self.config.timeout_secs,
            system_instruction: system_instruction(system_prompt),
            tools: if tools.is_empty() {
                Vec::new()
            } else {
                vec![Tool {
                    function_declarations: tools,
                }]
            },
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
            contents: history_contents(history),
        }))
    }
}

// ─── GeminiRound ─────────────────────────────────────────────────────────────

struct GeminiRound {
    http: HttpClient,
    url: String,
    api_key: String,
    timeout_secs: u64,
    system_instruction: Option<Content>,
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
    contents: Vec<Content>,
}

#[async_trait]
impl ModelRound for GeminiRound {
    async fn send(&mut self, content: TurnContent) -> Result<ModelResponse, InferenceError> {
        self.contents.push(user_content(content));

        let body = GenerateContentRequest {
            contents: &self.contents,
            system_instruction: self.system_instruction.as_ref(),
            tools: &self.tools,
            generation_config: self.generation_config,
        };

        tracing::info!(
            url = %self.url,
            content_count = self.contents.len(),
            tool_count = self.tools.first().map(|t| t.function_declarations.len()).unwrap_or(0),
            "model request"
        );

        let response = self
            .http
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        duration_secs: self.timeout_secs,
                    }
                } else {
                    InferenceError::ConnectionFailed {
                        endpoint: self.url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| InferenceError::InvalidResponse {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "model request failed");
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: text,
            });
        }

        let (model_content, reply) = parse_response(&text)?;
        tracing::info!(
            has_text = reply.text.is_some(),
            tool_calls = reply.tool_calls.len(),
            "model response"
        );
        self.contents.push(model_content);
        Ok(reply)
    }
}

// ─── Conversion helpers ──────────────────────────────────────────────────────

fn text_part(text: impl Into<String>) -> Part {
    Part {
        text: Some(text.into()),
        ..Part::default()
    }
}

fn system_instruction(prompt: String) -> Option<Content> {
    if prompt.trim().is_empty() {
        return None;
    }
    Some(Content {
        role: None,
        parts: vec![text_part(prompt)],
    })
}

fn history_contents(history: Vec<HistoryTurn>) -> Vec<Content> {
    history
        .into_iter()
        .map(|turn| Content {
            role: Some(
                match turn.role {
                    HistoryRole::User => "user",
                    HistoryRole::Model => "model",
                }
                .to_string(),
            ),
            parts: vec![text_part(turn.text)],
        })
        .collect()
}

fn user_content(content: TurnContent) -> Content {
    let parts = match content {
        TurnContent::Text(text) => vec![text_part(text)],
        TurnContent::ToolResults(results) => results
            .into_iter()
            .map(|result| Part {
                function_response: Some(FunctionResponse {
                    name: result.name,
                    response: wrap_function_response(result.response),
                }),
                ..Part::default()
            })
            .collect(),
    };
    Content {
        role: Some("user".to_string()),
        parts,
    }
}

/// `functionResponse.response` must be an object.
fn wrap_function_response(value: serde_json::Value) -> serde_json::Value {
    if value.is_object() {
        value
    } else {
        serde_json::json!({ "result": value })
    }
}

/// Decode a success body into the content to keep and the caller's view of it.
fn parse_response(body: &str) -> Result<(Content, ModelResponse), InferenceError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::InvalidResponse {
            reason: e.to_string(),
        })?;

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        let reason = parsed
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("prompt blocked: {r}"))
            .unwrap_or_else(|| "no candidates in response".to_string());
        return Err(InferenceError::InvalidResponse { reason });
    };

    let mut content = candidate.content.unwrap_or(Content {
        role: None,
        parts: Vec::new(),
    });
    if content.role.is_none() {
        content.role = Some("model".to_string());
    }

    if content.parts.is_empty() {
        tracing::debug!(finish_reason = ?candidate.finish_reason, "candidate has no parts");
    }

    let text: String = content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    let tool_calls = content
        .parts
        .iter()
        .filter_map(|p| p.function_call.as_ref())
        .map(|call| ToolCallRequest {
            name: call.name.clone(),
            args: if call.args.is_null() {
                serde_json::json!({})
            } else {
                call.args.clone()
            },
        })
        .collect();

    let reply = ModelResponse {
        text: Some(text).filter(|t| !t.is_empty()),
        tool_calls,
    };
    Ok((content, reply))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
