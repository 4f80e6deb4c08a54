//! Agent Core: chat orchestration for the search dashboard.
//!
//! Submodules:
//! - `tool_registry`: Declared tools, write-tool set, action descriptions
//! - `tool_executor`: Runs a tool call against the search backend
//! - `confirmation`: Single-slot allow/deny gate for write tools
//! - `session`: Message history, status machine, and the tool-calling loop
//! - `materializer`: Table derivation and reply condensation
//! - `prompts`: System prompt from the collection catalogue
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types and user-facing classification

pub mod confirmation;
pub mod errors;
pub mod materializer;
pub mod prompts;
pub mod session;
pub mod tool_executor;
pub mod tool_registry;
pub mod types;

pub(crate) mod text;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use confirmation::ConfirmationGate;
pub use errors::{AgentError, InputRejected, ToolError};
pub use session::{ConversationSession, SessionConfig};
pub use tool_executor::ToolExecutor;
pub use types::{
    ConversationStatus, FunctionCallRecord, Message, MessageRole, PendingAction, TableResult,
};
