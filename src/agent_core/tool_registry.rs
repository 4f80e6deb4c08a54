//! Tool Registry: the fixed set of functions the model may call.
//!
//! Declarations are static and ordered; the model sees them in this order.
//! Write tools (create/update/delete) always go through the confirmation gate.

use serde_json::{json, Map, Value};

use crate::inference::FunctionDeclaration;

use super::text::truncate_utf8;

// ─── Declarations ───────────────────────────────────────────────────────────

/// JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
}

impl ParamKind {
    fn schema_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
}

/// A callable tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

impl ToolDeclaration {
    /// JSON-schema object for the arguments.
    pub fn parameter_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in self.params {
            properties.insert(
                param.name.to_string(),
                json!({
                    "type": param.kind.schema_type(),
                    "description": param.description,
                }),
            );
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_params(),
        })
    }

    /// Names of required parameters, in declaration order.
    pub fn required_params(&self) -> Vec<&'static str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect()
    }

    pub fn to_function_declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.parameter_schema(),
        }
    }
}

const fn param(
    name: &'static str,
    kind: ParamKind,
    description: &'static str,
    required: bool,
) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        description,
        required,
    }
}

const COLLECTION: ParamSpec = param(
    "collection_name",
    ParamKind::String,
    "Name of the collection",
    true,
);

const DOCUMENT_ID: ParamSpec = param(
    "document_id",
    ParamKind::String,
    "ID of the document",
    true,
);

/// Every tool, in the order presented to the model.
pub const TOOL_DECLARATIONS: &[ToolDeclaration] = &[
    ToolDeclaration {
        name: "list_collections",
        description: "List all collections with their schemas and document counts.",
        params: &[],
    },
    ToolDeclaration {
        name: "get_collection_schema",
        description: "Get the schema (fields, types, facets) of one collection.",
        params: &[COLLECTION],
    },
    ToolDeclaration {
        name: "search_documents",
        description: "Search documents in a collection. Use q='*' to match everything.",
        params: &[
            COLLECTION,
            param(
                "q",
                ParamKind::String,
                "Search text, or * for all documents",
                true,
            ),
            param(
                "query_by",
                ParamKind::String,
                "Comma-separated fields to search in",
                true,
            ),
            param(
                "filter_by",
                ParamKind::String,
                "Filter expression, e.g. price:>100 && in_stock:true",
                false,
            ),
            param(
                "sort_by",
                ParamKind::String,
                "Sort expression, e.g. price:desc",
                false,
            ),
            param("page", ParamKind::Integer, "Page number, starting at 1", false),
            param("per_page", ParamKind::Integer, "Results per page", false),
        ],
    },
    ToolDeclaration {
        name: "get_document",
        description: "Fetch a single document by ID.",
        params: &[COLLECTION, DOCUMENT_ID],
    },
    ToolDeclaration {
        name: "count_documents",
        description: "Count documents in a collection, optionally matching a filter.",
        params: &[
            COLLECTION,
            param(
                "filter_by",
                ParamKind::String,
                "Filter expression to count only matching documents",
                false,
            ),
        ],
    },
    ToolDeclaration {
        name: "create_document",
        description: "Create a new document. Requires user confirmation.",
        params: &[
            COLLECTION,
            param(
                "document",
                ParamKind::String,
                "The document as a JSON object string",
                true,
            ),
        ],
    },
    ToolDeclaration {
        name: "update_document",
        description: "Update fields of an existing document. Requires user confirmation.",
        params: &[
            COLLECTION,
            DOCUMENT_ID,
            param(
                "document",
                ParamKind::String,
                "JSON object string with only the fields to change",
                true,
            ),
        ],
    },
    ToolDeclaration {
        name: "delete_document",
        description: "Delete a document by ID. Requires user confirmation.",
        params: &[COLLECTION, DOCUMENT_ID],
    },
];

/// Tools that mutate data and need confirmation.
pub const WRITE_TOOLS: &[&str] = &["create_document", "update_document", "delete_document"];

pub fn is_write_tool(name: &str) -> bool {
    WRITE_TOOLS.contains(&name)
}

pub fn find_tool(name: &str) -> Option<&'static ToolDeclaration> {
    TOOL_DECLARATIONS.iter().find(|t| t.name == name)
}

/// All declarations in the backend-neutral form.
pub fn function_declarations() -> Vec<FunctionDeclaration> {
    TOOL_DECLARATIONS
        .iter()
        .map(ToolDeclaration::to_function_declaration)
        .collect()
}

// ─── Action descriptions ────────────────────────────────────────────────────

/// Maximum bytes of argument JSON shown in a description.
const PREVIEW_BYTES: usize = 100;

/// Human-readable description of a tool call for the confirmation prompt.
pub fn describe_action(tool_name: &str, args: &Value) -> String {
    let collection = arg_text(args, "collection_name");
    let doc_id = arg_text(args, "document_id");

    match tool_name {
        "create_document" => {
            let preview = args
                .get("document")
                .map(document_preview)
                .unwrap_or_else(|| "<empty>".to_string());
            format!("Create a new document in '{collection}': {preview}")
        }
        "update_document" => {
            let fields = args
                .get("document")
                .and_then(document_fields)
                .unwrap_or_else(|| "<unknown fields>".to_string());
            format!("Update document '{doc_id}' in '{collection}' (fields: {fields})")
        }
        "delete_document" => {
            format!("Delete document '{doc_id}' from '{collection}'")
        }
        _ => {
            let args_preview = serde_json::to_string(args).unwrap_or_default();
            format!("Execute {tool_name}: {}", clip(&args_preview))
        }
    }
}

fn arg_text(args: &Value, key: &str) -> String {
    match args.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "<unknown>".to_string(),
    }
}

fn clip(text: &str) -> String {
    if text.len() > PREVIEW_BYTES {
        format!("{}...", truncate_utf8(text, PREVIEW_BYTES))
    } else {
        text.to_string()
    }
}

/// The document argument as compact JSON, whether it arrived as a string or object.
fn document_preview(document: &Value) -> String {
    let compact = match document {
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| raw.clone()),
        other => other.to_string(),
    };
    clip(&compact)
}

fn document_fields(document: &Value) -> Option<String> {
    let parsed = match document {
        Value::String(raw) => serde_json::from_str::<Value>(raw).ok()?,
        other => other.clone(),
    };
    let keys: Vec<&str> = parsed.as_object()?.keys().map(String::as_str).collect();
    Some(keys.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_order_and_count() {
        let names: Vec<&str> = TOOL_DECLARATIONS.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "list_collections",
                "get_collection_schema",
                "search_documents",
                "get_document",
                "count_documents",
                "create_document",
                "update_document",
                "delete_document",
            ]
        );
    }

    #[test]
    fn test_write_tools() {
        assert!(is_write_tool("delete_document"));
        assert!(is_write_tool("create_document"));
        assert!(!is_write_tool("search_documents"));
        assert!(!is_write_tool("count_documents"));
        for name in WRITE_TOOLS {
            assert!(find_tool(name).is_some());
        }
    }

    #[test]
    fn test_search_schema_required_params() {
        let search = find_tool("search_documents").unwrap();
        assert_eq!(search.required_params(), vec!["collection_name", "q", "query_by"]);

        let schema = search.parameter_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["per_page"]["type"], "integer");
        assert_eq!(schema["properties"]["filter_by"]["type"], "string");
    }

    #[test]
    fn test_list_collections_has_no_params() {
        let schema = find_tool("list_collections").unwrap().parameter_schema();
        assert!(schema["properties"].as_object().unwrap().is_empty());
        assert_eq!(schema["required"], json!([]));
    }

    #[test]
    fn test_describe_delete() {
        let args = json!({"collection_name": "users", "document_id": "42"});
        assert_eq!(
            describe_action("delete_document", &args),
            "Delete document '42' from 'users'"
        );
    }

    #[test]
    fn test_describe_update_lists_fields() {
        let args = json!({
            "collection_name": "users",
            "document_id": 7,
            "document": "{\"name\": \"Ada\", \"age\": 36}"
        });
        assert_eq!(
            describe_action("update_document", &args),
            "Update document '7' in 'users' (fields: name, age)"
        );
    }

    #[test]
    fn test_describe_create_truncates_long_documents() {
        let big = json!({"bio": "x".repeat(300)}).to_string();
        let args = json!({"collection_name": "users", "document": big});
        let text = describe_action("create_document", &args);
        assert!(text.starts_with("Create a new document in 'users': {\"bio\""));
        assert!(text.ends_with("..."));
    }

    #[test]
    fn test_describe_generic() {
        let text = describe_action("search_documents", &json!({"q": "*"}));
        assert_eq!(text, "Execute search_documents: {\"q\":\"*\"}");
    }
}
