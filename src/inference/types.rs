//! Shared types for the inference client.
//!
//! These are provider-neutral: the session builds them, and the backend
//! translates them to and from its wire format.

use serde::{Deserialize, Serialize};

// ─── Request Types ───────────────────────────────────────────────────────────

/// Speaker of a prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Model,
}

/// A prior text-only turn replayed when a round opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: HistoryRole,
    pub text: String,
}

impl HistoryTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: HistoryRole::Model,
            text: text.into(),
        }
    }
}

/// A callable function advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing the arguments.
    pub parameters: serde_json::Value,
}

/// What the session sends within an open round.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnContent {
    /// The user's utterance (first send of a round).
    Text(String),
    /// Every tool result of one tool round, in call order.
    ToolResults(Vec<ToolResultPart>),
}

/// One tool's outcome, keyed by function name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPart {
    pub name: String,
    pub response: serde_json::Value,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    /// Arguments as emitted; `{}` when the model sends none.
    #[serde(default)]
    pub args: serde_json::Value,
}

/// The model's reply to one send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    /// Concatenated text parts, `None` when the reply had no text.
    pub text: Option<String>,
    /// Function calls in emission order.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse {
    /// A text-only reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    /// A reply that only requests tools.
    pub fn calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: None,
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
