//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility. `HttpError` keeps the raw API body so the
//! session can classify it for the user.

use thiserror::Error;

/// Errors that can occur during inference operations.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// No API key has been supplied yet.
    #[error("model backend not initialized: missing API key")]
    NotInitialized,

    /// TCP/HTTP connection to the model endpoint failed.
    #[error("network error: connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The model endpoint did not respond within the configured timeout.
    #[error("network error: inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response could not be decoded or carried no candidate.
    #[error("invalid model response: {reason}")]
    InvalidResponse { reason: String },
}

impl InferenceError {
    /// Whether the failure happened before any response arrived.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            InferenceError::ConnectionFailed { .. } | InferenceError::Timeout { .. }
        )
    }
}
