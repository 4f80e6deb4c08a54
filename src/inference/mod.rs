//! Inference Client: the generative-language backend behind the assistant.
//!
//! This module handles:
//! - The [`ModelBackend`] / [`ModelRound`] contract the session drives
//! - A Gemini `generateContent` implementation with function calling
//! - Provider-neutral history, tool-call, and tool-result types

pub mod client;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::{GeminiClient, ModelBackend, ModelRound};
pub use errors::InferenceError;
pub use types::{
    FunctionDeclaration, HistoryRole, HistoryTurn, ModelResponse, ToolCallRequest, ToolResultPart,
    TurnContent,
};
