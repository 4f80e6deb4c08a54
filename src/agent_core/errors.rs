//! Agent Core error types.
//!
//! Three families with different destinations:
//! - [`InputRejected`] goes back to the caller of `send_message` and never
//!   becomes a chat message.
//! - [`ToolError`] is captured per call and handed to the model as
//!   `{"error": "<message>"}`.
//! - [`AgentError`] ends a turn; [`user_facing_message`] turns it into the text
//!   of the `error` message that replaces the loading placeholder.

use thiserror::Error;

use crate::inference::InferenceError;
use crate::search_client::SearchError;

use super::text::{first_sentence, truncate_chars};

// ─── Input rejection ─────────────────────────────────────────────────────────

/// Reasons a send is refused before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputRejected {
    #[error("message is empty")]
    Blank,

    #[error("a reply is already in progress")]
    Busy,

    #[error("sending too fast; retry in {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("model backend is not initialized")]
    BackendUninitialized,
}

// ─── Tool errors ─────────────────────────────────────────────────────────────

/// A single tool invocation failed. Never aborts the round.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("missing required argument: {name}")]
    MissingArgument { name: String },

    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("invalid document JSON: {reason}")]
    InvalidDocument { reason: String },

    #[error("failed to encode result: {reason}")]
    Encode { reason: String },

    #[error(transparent)]
    Backend(#[from] SearchError),
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::Encode {
            reason: e.to_string(),
        }
    }
}

// ─── Turn errors ─────────────────────────────────────────────────────────────

/// Errors that end a turn.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model backend failed (transport, HTTP, or decoding).
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Confirmation channel error.
    #[error("confirmation channel error: {reason}")]
    Confirmation { reason: String },

    /// The conversation was cleared while the turn was running.
    #[error("conversation was cleared")]
    Cleared,
}

// ─── User-facing classification ──────────────────────────────────────────────

pub const RATE_LIMIT_MESSAGE: &str =
    "The AI service is rate limited or out of quota. Please wait a moment and try again.";

pub const INVALID_KEY_MESSAGE: &str =
    "The AI API key is invalid or lacks permission. Please check your API key.";

pub const NETWORK_MESSAGE: &str =
    "Network error: could not reach the AI service. Check your connection and try again.";

/// Maximum length of an unclassified error shown to the user.
const MAX_ERROR_CHARS: usize = 200;

/// Map a turn failure to the text shown in the chat.
pub fn user_facing_message(err: &AgentError) -> String {
    if let AgentError::Inference(inner) = err {
        if inner.is_network() {
            return NETWORK_MESSAGE.to_string();
        }
    }
    classify_error_text(&err.to_string())
}

/// Substring classification of a raw error message.
pub fn classify_error_text(raw: &str) -> String {
    let lower = raw.to_lowercase();

    if lower.contains("quota") || raw.contains("429") || raw.contains("RESOURCE_EXHAUSTED") {
        return RATE_LIMIT_MESSAGE.to_string();
    }
    if raw.contains("API_KEY_INVALID") || raw.contains("401") || raw.contains("PERMISSION_DENIED")
    {
        return INVALID_KEY_MESSAGE.to_string();
    }
    if lower.contains("fetch") || lower.contains("network") {
        return NETWORK_MESSAGE.to_string();
    }

    let detail = embedded_error_message(raw).unwrap_or_else(|| raw.trim().to_string());
    let sentence = first_sentence(&detail);
    let text = if sentence.is_empty() {
        detail.clone()
    } else {
        format!("{sentence}.")
    };
    truncate_chars(&text, MAX_ERROR_CHARS)
}

/// Pull `error.message` (or a top-level `message`) out of JSON embedded in
/// an error string such as `HTTP 400: {"error": {...}}`.
fn embedded_error_message(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    let parsed: serde_json::Value = serde_json::from_str(&raw[start..=end]).ok()?;
    parsed
        .get("error")
        .and_then(|e| e.get("message"))
        .or_else(|| parsed.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}
