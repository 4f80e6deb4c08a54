//! Shared types for the search client.
//!
//! These mirror the Typesense collection and search REST payloads. Documents
//! themselves stay as `serde_json::Value` since their shape is per-collection.

use serde::{Deserialize, Serialize};

// ─── Collections ────────────────────────────────────────────────────────────

/// A collection schema as returned by `GET /collections/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub num_documents: u64,
    #[serde(default)]
    pub fields: Vec<CollectionField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sorting_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

/// One field declaration within a collection schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub facet: bool,
    #[serde(default)]
    pub optional: bool,
    /// Absent means indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_dim: Option<u32>,
    /// Auto-embedding configuration (`{"from": [...], "model_config": {...}}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<serde_json::Value>,
}

impl CollectionField {
    /// Whether the engine indexes this field.
    pub fn is_indexed(&self) -> bool {
        self.index != Some(false)
    }

    /// Whether the field is free-text searchable (`string` or `string[]`).
    pub fn is_text(&self) -> bool {
        self.field_type == "string" || self.field_type == "string[]"
    }

    /// Whether the field holds a vector embedding.
    pub fn is_embedding(&self) -> bool {
        self.embed.is_some() || (self.num_dim.is_some() && self.field_type == "float[]")
    }
}

// ─── Search ─────────────────────────────────────────────────────────────────

/// Query parameters for `GET /collections/{name}/documents/search`.
///
/// `filter_by` and `sort_by` are passed through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchParams {
    pub q: String,
    pub query_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

/// Search response (only the parts the assistant surfaces).
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub found: u64,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub search_time_ms: u64,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

fn default_page() -> u32 {
    1
}

/// A single search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub document: serde_json::Value,
}

/// Error body shape: `{"message": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_schema_deserialization() {
        let json = r#"{
            "name": "products",
            "num_documents": 120,
            "created_at": 1700000000,
            "default_sorting_field": "",
            "fields": [
                {"name": "title", "type": "string", "facet": false},
                {"name": "tags", "type": "string[]", "facet": true, "optional": true},
                {"name": "price", "type": "float"},
                {"name": "notes", "type": "string", "index": false, "optional": true},
                {"name": "vec", "type": "float[]", "num_dim": 384,
                 "embed": {"from": ["title"], "model_config": {"model_name": "ts/all-MiniLM-L12-v2"}}}
            ]
        }"#;
        let schema: CollectionSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.name, "products");
        assert_eq!(schema.num_documents, 120);
        assert_eq!(schema.fields.len(), 5);
        assert!(schema.fields[0].is_text());
        assert!(schema.fields[1].facet);
        assert!(!schema.fields[3].is_indexed());
        assert!(schema.fields[4].is_embedding());
        assert!(!schema.fields[2].is_embedding());
    }

    #[test]
    fn test_search_params_omit_none() {
        let params = SearchParams {
            q: "*".into(),
            query_by: "title".into(),
            filter_by: None,
            sort_by: Some("price:desc".into()),
            page: Some(1),
            per_page: None,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert!(json.get("filter_by").is_none());
        assert!(json.get("per_page").is_none());
        assert_eq!(json["sort_by"], "price:desc");
    }

    #[test]
    fn test_search_response_defaults() {
        let resp: SearchResponse = serde_json::from_str(r#"{"found": 0}"#).unwrap();
        assert_eq!(resp.page, 1);
        assert!(resp.hits.is_empty());
    }
}
