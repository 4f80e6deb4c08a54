//! Typesense REST client.
//!
//! Implements [`SearchBackend`], the data-service contract the tool executor
//! drives. Every request carries the `X-TYPESENSE-API-KEY` header; path
//! segments (collection names, document ids) are percent-encoded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::config::SearchConfig;

use super::errors::SearchError;
use super::types::{CollectionSchema, ErrorBody, SearchParams, SearchResponse};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the admin/search API key.
const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

// ─── SearchBackend ───────────────────────────────────────────────────────────

/// Collection and document operations the assistant may invoke.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// List every collection with its schema.
    async fn list_collections(&self) -> Result<Vec<CollectionSchema>, SearchError>;

    /// Fetch one collection's schema.
    async fn get_collection(&self, name: &str) -> Result<CollectionSchema, SearchError>;

    /// Run a search against a collection.
    async fn search_documents(
        &self,
        collection: &str,
        params: &SearchParams,
    ) -> Result<SearchResponse, SearchError>;

    /// Fetch a single document by id.
    async fn get_document(&self, collection: &str, id: &str)
        -> Result<serde_json::Value, SearchError>;

    /// Index a new document; returns the stored document.
    async fn create_document(
        &self,
        collection: &str,
        document: serde_json::Value,
    ) -> Result<serde_json::Value, SearchError>;

    /// Partially update a document; returns the updated fields.
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        partial: serde_json::Value,
    ) -> Result<serde_json::Value, SearchError>;

    /// Delete a document; returns the deleted document.
    async fn delete_document(&self, collection: &str, id: &str)
        -> Result<serde_json::Value, SearchError>;
}

// ─── TypesenseClient ─────────────────────────────────────────────────────────

/// HTTP client for a single Typesense node.
pub struct TypesenseClient {
    http: HttpClient,
    base_url: Url,
    api_key: String,
}

impl TypesenseClient {
    /// Build a client from configuration. Does NOT check connectivity.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let base_url = Url::parse(&config.url).map_err(|e| SearchError::InvalidEndpoint {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::ConnectionFailed {
                endpoint: config.url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// The configured node URL.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Check whether the node reports itself healthy.
    pub async fn health(&self) -> bool {
        let Ok(url) = self.endpoint(&["health"]) else {
            return false;
        };
        match self.http.get(url).timeout(CONNECT_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SearchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SearchError::InvalidEndpoint {
                url: self.base_url.to_string(),
                reason: "URL cannot be a base".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and decode a JSON success body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T, SearchError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout {
                        endpoint: url.to_string(),
                    }
                } else {
                    SearchError::ConnectionFailed {
                        endpoint: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::InvalidResponse {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "search engine returned error");
            return Err(SearchError::Http {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| SearchError::InvalidResponse {
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl SearchBackend for TypesenseClient {
    async fn list_collections(&self) -> Result<Vec<CollectionSchema>, SearchError> {
        let url = self.endpoint(&["collections"])?;
        self.send_json(self.http.get(url.clone()), &url).await
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionSchema, SearchError> {
        let url = self.endpoint(&["collections", name])?;
        self.send_json(self.http.get(url.clone()), &url).await
    }

    async fn search_documents(
        &self,
        collection: &str,
        params: &SearchParams,
    ) -> Result<SearchResponse, SearchError> {
        let url = self.endpoint(&["collections", collection, "documents", "search"])?;
        tracing::debug!(collection, q = %params.q, query_by = %params.query_by, "search");
        self.send_json(self.http.get(url.clone()).query(params), &url)
            .await
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<serde_json::Value, SearchError> {
        let url = self.endpoint(&["collections", collection, "documents", id])?;
        self.send_json(self.http.get(url.clone()), &url).await
    }

    async fn create_document(
        &self,
        collection: &str,
        document: serde_json::Value,
    ) -> Result<serde_json::Value, SearchError> {
        let url = self.endpoint(&["collections", collection, "documents"])?;
        self.send_json(self.http.post(url.clone()).json(&document), &url)
            .await
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        partial: serde_json::Value,
    ) -> Result<serde_json::Value, SearchError> {
        let url = self.endpoint(&["collections", collection, "documents", id])?;
        self.send_json(self.http.patch(url.clone()).json(&partial), &url)
            .await
    }

    async fn delete_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<serde_json::Value, SearchError> {
        let url = self.endpoint(&["collections", collection, "documents", id])?;
        self.send_json(self.http.delete(url.clone()), &url).await
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Pull `message` out of a JSON error body, falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(url: &str) -> TypesenseClient {
        TypesenseClient::new(&SearchConfig {
            url: url.to_string(),
            api_key: "xyz".to_string(),
            timeout_secs: 10,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let client = test_client("http://localhost:8108");
        let url = client.endpoint(&["collections", "books"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8108/collections/books");
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_drops_trailing_slash() {
        let client = test_client("https://search.example.com/typesense/");
        let url = client
            .endpoint(&["collections", "books", "documents", "search"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://search.example.com/typesense/collections/books/documents/search"
        );
    }

    #[test]
    fn test_endpoint_encodes_document_ids() {
        let client = test_client("http://localhost:8108");
        let url = client
            .endpoint(&["collections", "books", "documents", "a/b c"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8108/collections/books/documents/a%2Fb%20c"
        );
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let result = TypesenseClient::new(&SearchConfig {
            url: "not a url".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
        });
        assert!(matches!(result, Err(SearchError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_extract_error_message_json() {
        let msg = extract_error_message(r#"{"message": "Not Found"}"#);
        assert_eq!(msg, "Not Found");
    }

    #[test]
    fn test_extract_error_message_plain() {
        assert_eq!(extract_error_message("  upstream down \n"), "upstream down");
        assert_eq!(extract_error_message(""), "empty response body");
    }
}
