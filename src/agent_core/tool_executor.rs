//! Tool Executor: runs one tool call against the search backend.
//!
//! Argument parsing is lenient where models are inconsistent (numbers as
//! strings, documents as objects instead of JSON strings) and strict where a
//! guess would be wrong (missing collection or id). Vector-like fields are
//! replaced with a short placeholder before results reach the model or the
//! table.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};

use crate::search_client::{SearchBackend, SearchParams};

use super::errors::ToolError;

// ─── Constants ──────────────────────────────────────────────────────────────

const DEFAULT_QUERY: &str = "*";
const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PER_PAGE: u32 = 25;

/// Arrays longer than this with a numeric first element are treated as embeddings.
const EMBEDDING_MIN_LEN: usize = 10;

// ─── ToolExecutor ───────────────────────────────────────────────────────────

/// Dispatches tool names to backend calls.
#[derive(Clone)]
pub struct ToolExecutor {
    backend: Arc<dyn SearchBackend>,
}

impl ToolExecutor {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Execute a tool call and return its JSON result.
    pub async fn execute(&self, name: &str, args: &Value) -> Result<Value, ToolError> {
        let start = Instant::now();

        let result = match name {
            "list_collections" => self.list_collections().await,
            "get_collection_schema" => self.get_collection_schema(args).await,
            "search_documents" => self.search_documents(args).await,
            "get_document" => self.get_document(args).await,
            "count_documents" => self.count_documents(args).await,
            "create_document" => self.create_document(args).await,
            "update_document" => self.update_document(args).await,
            "delete_document" => self.delete_document(args).await,
            _ => Err(ToolError::UnknownFunction {
                name: name.to_string(),
            }),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(tool = %name, elapsed_ms, "tool executed"),
            Err(e) => tracing::warn!(tool = %name, elapsed_ms, error = %e, "tool failed"),
        }
        result
    }

    async fn list_collections(&self) -> Result<Value, ToolError> {
        let collections = self.backend.list_collections().await?;
        Ok(serde_json::to_value(collections)?)
    }

    async fn get_collection_schema(&self, args: &Value) -> Result<Value, ToolError> {
        let collection = required_string(args, "collection_name")?;
        let schema = self.backend.get_collection(&collection).await?;
        Ok(serde_json::to_value(schema)?)
    }

    async fn search_documents(&self, args: &Value) -> Result<Value, ToolError> {
        let collection = required_string(args, "collection_name")?;
        let params = SearchParams {
            q: optional_string(args, "q").unwrap_or_else(|| DEFAULT_QUERY.to_string()),
            query_by: required_string(args, "query_by")?,
            filter_by: optional_string(args, "filter_by"),
            sort_by: optional_string(args, "sort_by"),
            page: Some(optional_u32(args, "page")?.unwrap_or(DEFAULT_PAGE)),
            per_page: Some(optional_u32(args, "per_page")?.unwrap_or(DEFAULT_PER_PAGE)),
        };

        let response = self.backend.search_documents(&collection, &params).await?;
        let documents: Vec<Value> = response
            .hits
            .into_iter()
            .map(|hit| sanitize_document(hit.document))
            .collect();

        Ok(json!({
            "found": response.found,
            "page": response.page,
            "search_time_ms": response.search_time_ms,
            "documents": documents,
        }))
    }

    async fn get_document(&self, args: &Value) -> Result<Value, ToolError> {
        let collection = required_string(args, "collection_name")?;
        let id = required_string(args, "document_id")?;
        let document = self.backend.get_document(&collection, &id).await?;
        Ok(sanitize_document(document))
    }

    async fn count_documents(&self, args: &Value) -> Result<Value, ToolError> {
        let collection = required_string(args, "collection_name")?;
        let schema = self.backend.get_collection(&collection).await?;

        let text_fields: Vec<&str> = schema
            .fields
            .iter()
            .filter(|f| f.is_text() && f.is_indexed())
            .map(|f| f.name.as_str())
            .collect();
        let query_by = if !text_fields.is_empty() {
            text_fields.join(",")
        } else if let Some(first) = schema.fields.first() {
            first.name.clone()
        } else {
            "id".to_string()
        };

        let params = SearchParams {
            q: DEFAULT_QUERY.to_string(),
            query_by,
            filter_by: optional_string(args, "filter_by"),
            sort_by: None,
            page: None,
            per_page: Some(0),
        };
        let response = self.backend.search_documents(&collection, &params).await?;

        Ok(json!({
            "count": response.found,
            "collection": collection,
        }))
    }

    async fn create_document(&self, args: &Value) -> Result<Value, ToolError> {
        let collection = required_string(args, "collection_name")?;
        let document = decode_document(args)?;
        let stored = self.backend.create_document(&collection, document).await?;
        Ok(sanitize_document(stored))
    }

    async fn update_document(&self, args: &Value) -> Result<Value, ToolError> {
        let collection = required_string(args, "collection_name")?;
        let id = required_string(args, "document_id")?;
        let partial = decode_document(args)?;
        let updated = self
            .backend
            .update_document(&collection, &id, partial)
            .await?;
        Ok(sanitize_document(updated))
    }

    async fn delete_document(&self, args: &Value) -> Result<Value, ToolError> {
        let collection = required_string(args, "collection_name")?;
        let id = required_string(args, "document_id")?;
        self.backend.delete_document(&collection, &id).await?;
        Ok(json!({ "success": true, "deleted": id }))
    }
}

// ─── Argument helpers ───────────────────────────────────────────────────────

/// A required string argument. Numbers are accepted and stringified (ids).
fn required_string(args: &Value, name: &str) -> Result<String, ToolError> {
    match args.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(_)) | Some(Value::Null) | None => Err(ToolError::MissingArgument {
            name: name.to_string(),
        }),
        Some(other) => Err(ToolError::InvalidArgument {
            name: name.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

/// An optional string argument; empty strings count as absent.
fn optional_string(args: &Value, name: &str) -> Option<String> {
    match args.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// An optional non-negative integer given as an integer, an integral float,
/// or a numeric string.
fn optional_u32(args: &Value, name: &str) -> Result<Option<u32>, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArgument {
        name: name.to_string(),
        reason,
    };

    let number = match args.get(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    let Some(value) = number else {
        return Err(invalid("expected an integer".to_string()));
    };
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(invalid(format!("expected a non-negative integer, got {value}")));
    }
    Ok(Some(value as u32))
}

/// The `document` argument as a JSON object.
fn decode_document(args: &Value) -> Result<Value, ToolError> {
    let parsed = match args.get("document") {
        None | Some(Value::Null) => {
            return Err(ToolError::MissingArgument {
                name: "document".to_string(),
            })
        }
        Some(Value::String(raw)) => {
            serde_json::from_str::<Value>(raw).map_err(|e| ToolError::InvalidDocument {
                reason: e.to_string(),
            })?
        }
        Some(other) => other.clone(),
    };

    if parsed.is_object() {
        Ok(parsed)
    } else {
        Err(ToolError::InvalidDocument {
            reason: "document must be a JSON object".to_string(),
        })
    }
}

// ─── Sanitation ─────────────────────────────────────────────────────────────

/// Replace top-level embedding arrays with `"[embedding: N dimensions]"`.
pub fn sanitize_document(document: Value) -> Value {
    match document {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key, sanitize_field(value)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

fn sanitize_field(value: Value) -> Value {
    match value {
        Value::Array(items)
            if items.len() > EMBEDDING_MIN_LEN && items.first().is_some_and(Value::is_number) =>
        {
            Value::String(format!("[embedding: {} dimensions]", items.len()))
        }
        other => other,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::test_support::MockSearch;
    use crate::search_client::{CollectionField, CollectionSchema};

    fn field(name: &str, field_type: &str) -> CollectionField {
        CollectionField {
            name: name.to_string(),
            field_type: field_type.to_string(),
            facet: false,
            optional: false,
            index: None,
            num_dim: None,
            embed: None,
        }
    }

    fn schema(name: &str, fields: Vec<CollectionField>) -> CollectionSchema {
        CollectionSchema {
            name: name.to_string(),
            num_documents: 0,
            fields,
            default_sorting_field: None,
            created_at: None,
        }
    }

    fn executor(mock: &Arc<MockSearch>) -> ToolExecutor {
        ToolExecutor::new(mock.clone())
    }

    #[test]
    fn test_sanitize_replaces_embeddings() {
        let vector: Vec<f64> = (0..384).map(|i| i as f64 / 384.0).collect();
        let doc = json!({"id": "1", "title": "Dune", "vec": vector, "tags": ["a", "b"]});
        let clean = sanitize_document(doc);
        assert_eq!(clean["vec"], "[embedding: 384 dimensions]");
        assert_eq!(clean["tags"], json!(["a", "b"]));
        assert_eq!(clean["title"], "Dune");
    }

    #[test]
    fn test_sanitize_keeps_short_and_non_numeric_arrays() {
        let doc = json!({
            "scores": [1, 2, 3],
            "names": ["a","b","c","d","e","f","g","h","i","j","k","l"],
            "exactly_ten": [0,1,2,3,4,5,6,7,8,9]
        });
        let clean = sanitize_document(doc.clone());
        assert_eq!(clean, doc);
    }

    #[test]
    fn test_sanitize_preserves_key_order() {
        let doc = json!({"z": 1, "a": 2, "m": 3});
        let clean = sanitize_document(doc);
        let keys: Vec<&String> = clean.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_optional_u32_accepts_model_variants() {
        let args = json!({"a": 3, "b": 4.0, "c": "5", "d": "", "e": 2.5, "f": "x", "g": -1});
        assert_eq!(optional_u32(&args, "a").unwrap(), Some(3));
        assert_eq!(optional_u32(&args, "b").unwrap(), Some(4));
        assert_eq!(optional_u32(&args, "c").unwrap(), Some(5));
        assert_eq!(optional_u32(&args, "d").unwrap(), None);
        assert_eq!(optional_u32(&args, "missing").unwrap(), None);
        assert!(optional_u32(&args, "e").is_err());
        assert!(optional_u32(&args, "f").is_err());
        assert!(optional_u32(&args, "g").is_err());
    }

    #[test]
    fn test_decode_document_variants() {
        let doc = decode_document(&json!({"document": "{\"name\": \"Ada\"}"})).unwrap();
        assert_eq!(doc["name"], "Ada");

        let doc = decode_document(&json!({"document": {"name": "Ada"}})).unwrap();
        assert_eq!(doc["name"], "Ada");

        assert!(matches!(
            decode_document(&json!({"document": "{not json"})),
            Err(ToolError::InvalidDocument { .. })
        ));
        assert!(matches!(
            decode_document(&json!({"document": "[1, 2]"})),
            Err(ToolError::InvalidDocument { .. })
        ));
        assert!(matches!(
            decode_document(&json!({})),
            Err(ToolError::MissingArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let mock = Arc::new(MockSearch::new());
        let err = executor(&mock)
            .execute("drop_everything", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown function: drop_everything");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_applies_defaults_and_sanitizes() {
        let mock = Arc::new(MockSearch::new());
        let vector: Vec<f64> = vec![0.5; 16];
        mock.set_search_hits(3, vec![json!({"id": "1", "name": "Ada", "vec": vector})]);

        let result = executor(&mock)
            .execute(
                "search_documents",
                &json!({"collection_name": "users", "query_by": "name", "filter_by": "age:>30"}),
            )
            .await
            .unwrap();

        assert_eq!(result["found"], 3);
        assert_eq!(result["page"], 1);
        assert_eq!(result["documents"][0]["vec"], "[embedding: 16 dimensions]");

        let params = mock.last_search().unwrap();
        assert_eq!(params.q, "*");
        assert_eq!(params.page, Some(1));
        assert_eq!(params.per_page, Some(25));
        assert_eq!(params.filter_by.as_deref(), Some("age:>30"));
        assert!(params.sort_by.is_none());
    }

    #[tokio::test]
    async fn test_search_requires_collection() {
        let mock = Arc::new(MockSearch::new());
        let err = executor(&mock)
            .execute("search_documents", &json!({"q": "x", "query_by": "name"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingArgument { ref name } if name == "collection_name"));
    }

    #[tokio::test]
    async fn test_count_uses_indexed_text_fields() {
        let mock = Arc::new(MockSearch::new());
        let mut notes = field("notes", "string");
        notes.index = Some(false);
        mock.add_collection(schema(
            "users",
            vec![
                field("name", "string"),
                field("age", "int32"),
                field("tags", "string[]"),
                notes,
            ],
        ));
        mock.set_search_hits(7, Vec::new());

        let result = executor(&mock)
            .execute("count_documents", &json!({"collection_name": "users"}))
            .await
            .unwrap();

        assert_eq!(result, json!({"count": 7, "collection": "users"}));
        let params = mock.last_search().unwrap();
        assert_eq!(params.query_by, "name,tags");
        assert_eq!(params.per_page, Some(0));
    }

    #[tokio::test]
    async fn test_count_falls_back_to_first_field() {
        let mock = Arc::new(MockSearch::new());
        mock.add_collection(schema("metrics", vec![field("value", "float"), field("ts", "int64")]));

        executor(&mock)
            .execute("count_documents", &json!({"collection_name": "metrics"}))
            .await
            .unwrap();
        assert_eq!(mock.last_search().unwrap().query_by, "value");
    }

    #[tokio::test]
    async fn test_count_with_no_fields_uses_id() {
        let mock = Arc::new(MockSearch::new());
        mock.add_collection(schema("empty", Vec::new()));

        executor(&mock)
            .execute(
                "count_documents",
                &json!({"collection_name": "empty", "filter_by": "x:=1"}),
            )
            .await
            .unwrap();
        let params = mock.last_search().unwrap();
        assert_eq!(params.query_by, "id");
        assert_eq!(params.filter_by.as_deref(), Some("x:=1"));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_json_without_backend_call() {
        let mock = Arc::new(MockSearch::new());
        let err = executor(&mock)
            .execute(
                "create_document",
                &json!({"collection_name": "users", "document": "{oops"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidDocument { .. }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_returns_stored_document() {
        let mock = Arc::new(MockSearch::new());
        let result = executor(&mock)
            .execute(
                "create_document",
                &json!({"collection_name": "users", "document": "{\"id\": \"9\", \"name\": \"Lin\"}"}),
            )
            .await
            .unwrap();
        assert_eq!(result["name"], "Lin");
        assert_eq!(mock.calls(), vec!["create_document:users".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_returns_confirmation_shape() {
        let mock = Arc::new(MockSearch::new());
        let result = executor(&mock)
            .execute(
                "delete_document",
                &json!({"collection_name": "users", "document_id": 12}),
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"success": true, "deleted": "12"}));
        assert_eq!(mock.calls(), vec!["delete_document:users/12".to_string()]);
    }

    #[tokio::test]
    async fn test_backend_error_is_tool_error() {
        let mock = Arc::new(MockSearch::new());
        let err = executor(&mock)
            .execute(
                "get_document",
                &json!({"collection_name": "users", "document_id": "404"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Backend(ref e) if e.is_not_found()));
    }
}
