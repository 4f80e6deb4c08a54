//! Search Client: REST access to the search engine's collections and documents.
//!
//! This module handles:
//! - The [`SearchBackend`] contract used by the tool executor
//! - A Typesense implementation over HTTP
//! - Collection schema and search payload types

pub mod client;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::{SearchBackend, TypesenseClient};
pub use errors::SearchError;
pub use types::{CollectionField, CollectionSchema, SearchHit, SearchParams, SearchResponse};
