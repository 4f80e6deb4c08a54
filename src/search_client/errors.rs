//! Search backend error types.

use thiserror::Error;

/// Errors that can occur while talking to the search engine.
#[derive(Debug, Error)]
pub enum SearchError {
    /// TCP/HTTP connection to the search node failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The search node did not respond within the configured timeout.
    #[error("search request timed out: {endpoint}")]
    Timeout { endpoint: String },

    /// Non-2xx HTTP response. `message` is the engine's `message` field when
    /// the body is JSON, the raw body otherwise.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("invalid response from search engine: {reason}")]
    InvalidResponse { reason: String },

    /// The configured base URL cannot carry path segments.
    #[error("invalid search endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

impl SearchError {
    /// Whether the engine reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SearchError::Http { status: 404, .. })
    }
}
