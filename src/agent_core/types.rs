//! Shared types for the agent core.
//!
//! Chat messages, conversation status, pending write actions, and the
//! per-turn function-call records and table used by the session and the
//! dashboard. Everything serializes camelCase for the dashboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Messages ───────────────────────────────────────────────────────────────

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Error,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// UUID v4, unique within the session.
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Table derived from this turn's tool results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_data: Option<TableResult>,
    /// Tool invocations made while producing this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_calls: Option<Vec<FunctionCallRecord>>,
    /// True only for the placeholder shown while a turn runs.
    #[serde(default)]
    pub is_loading: bool,
}

impl Message {
    fn new(role: MessageRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            table_data: None,
            function_calls: None,
            is_loading: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into())
    }

    /// The assistant placeholder appended when a turn starts.
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::new(MessageRole::Assistant, String::new())
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        table_data: Option<TableResult>,
        function_calls: Vec<FunctionCallRecord>,
    ) -> Self {
        Self {
            table_data,
            function_calls: (!function_calls.is_empty()).then_some(function_calls),
            ..Self::new(MessageRole::Assistant, content.into())
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Error, content.into())
    }
}

// ─── Status ─────────────────────────────────────────────────────────────────

/// Where the session is in a turn. Only `Idle` accepts a new send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationStatus {
    #[default]
    Idle,
    Sending,
    CallingFunction,
    Generating,
    AwaitingConfirmation,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Idle => "idle",
            ConversationStatus::Sending => "sending",
            ConversationStatus::CallingFunction => "calling-function",
            ConversationStatus::Generating => "generating",
            ConversationStatus::AwaitingConfirmation => "awaiting-confirmation",
        }
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Confirmation ───────────────────────────────────────────────────────────

/// A write tool call waiting for the user's allow/deny.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub tool_name: String,
    pub args: serde_json::Value,
    /// One-line description shown in the confirmation prompt.
    pub human_description: String,
}

// ─── Turn results ───────────────────────────────────────────────────────────

/// One tool invocation within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallRecord {
    pub name: String,
    pub args: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// Tabular view of a turn's results.
///
/// Every row's keys are a subset of `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResult {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub collection_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_found: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_camel_case() {
        let msg = Message::assistant(
            "Found 1 result.",
            None,
            vec![FunctionCallRecord {
                name: "get_document".into(),
                args: serde_json::json!({"collection_name": "books", "document_id": "1"}),
                result: None,
            }],
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["isLoading"], false);
        assert_eq!(json["functionCalls"][0]["name"], "get_document");
        assert!(json.get("tableData").is_none());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::user("a");
        let b = Message::user("a");
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_assistant_without_calls_omits_records() {
        let msg = Message::assistant("hi", None, Vec::new());
        assert!(msg.function_calls.is_none());
        assert!(Message::loading().is_loading);
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_value(ConversationStatus::AwaitingConfirmation).unwrap();
        assert_eq!(json, "awaiting-confirmation");
        assert_eq!(ConversationStatus::CallingFunction.to_string(), "calling-function");
        assert_eq!(ConversationStatus::default(), ConversationStatus::Idle);
    }

    #[test]
    fn test_table_result_serialization() {
        let table = TableResult {
            columns: vec!["id".into()],
            rows: vec![],
            collection_name: "users".into(),
            total_found: Some(2),
        };
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["collectionName"], "users");
        assert_eq!(json["totalFound"], 2);
    }
}
