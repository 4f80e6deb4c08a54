//! Result Materializer: turns a turn's function calls into a table and
//! condenses the model's prose when a table carries the data.
//!
//! Table sources in priority order (first match wins, records scanned in
//! call order within each rule):
//! 1. `search_documents` with at least one document
//! 2. `get_document` returning an object without `error`
//! 3. `list_collections` returning a non-empty array
//! 4. `get_collection_schema` returning a `fields` array

use serde_json::{Map, Value};

use super::text::first_sentence;
use super::types::{FunctionCallRecord, TableResult};

/// Replies at or under this length are kept as written.
const MAX_REPLY_CHARS: usize = 200;

/// A first sentence longer than this falls back to the generic summary.
const MAX_SENTENCE_CHARS: usize = 150;

// ─── Table derivation ───────────────────────────────────────────────────────

/// Pick the best table source among the turn's records.
pub fn derive_table(records: &[FunctionCallRecord]) -> Option<TableResult> {
    let rules: [fn(&FunctionCallRecord) -> Option<TableResult>; 4] = [
        search_table,
        document_table,
        collections_table,
        schema_table,
    ];
    rules
        .iter()
        .find_map(|rule| records.iter().find_map(rule))
}

fn collection_arg(record: &FunctionCallRecord) -> String {
    record
        .args
        .get("collection_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn search_table(record: &FunctionCallRecord) -> Option<TableResult> {
    if record.name != "search_documents" {
        return None;
    }
    let result = record.result.as_ref()?;
    let documents = result.get("documents")?.as_array()?;
    let first = documents.first()?.as_object()?;

    let columns: Vec<String> = first.keys().cloned().collect();
    let rows = documents
        .iter()
        .filter_map(Value::as_object)
        .map(|doc| project(doc, &columns))
        .collect();

    Some(TableResult {
        columns,
        rows,
        collection_name: collection_arg(record),
        total_found: result.get("found").and_then(Value::as_u64),
    })
}

fn document_table(record: &FunctionCallRecord) -> Option<TableResult> {
    if record.name != "get_document" {
        return None;
    }
    let document = record.result.as_ref()?.as_object()?;
    if document.contains_key("error") {
        return None;
    }
    Some(TableResult {
        columns: document.keys().cloned().collect(),
        rows: vec![document.clone()],
        collection_name: collection_arg(record),
        total_found: Some(1),
    })
}

fn collections_table(record: &FunctionCallRecord) -> Option<TableResult> {
    if record.name != "list_collections" {
        return None;
    }
    let collections = record.result.as_ref()?.as_array()?;
    if collections.is_empty() {
        return None;
    }

    let rows = collections
        .iter()
        .filter_map(Value::as_object)
        .map(|c| {
            let mut row = Map::new();
            row.insert("name".into(), c.get("name").cloned().unwrap_or(Value::Null));
            row.insert(
                "num_documents".into(),
                c.get("num_documents").cloned().unwrap_or(Value::from(0)),
            );
            let field_count = c
                .get("fields")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            row.insert("fields".into(), Value::from(field_count));
            row
        })
        .collect();

    Some(TableResult {
        columns: vec!["name".into(), "num_documents".into(), "fields".into()],
        rows,
        collection_name: "collections".into(),
        total_found: None,
    })
}

fn schema_table(record: &FunctionCallRecord) -> Option<TableResult> {
    if record.name != "get_collection_schema" {
        return None;
    }
    let result = record.result.as_ref()?;
    let fields = result.get("fields")?.as_array()?;

    let yes_no = |flag: bool| Value::from(if flag { "Yes" } else { "No" });
    let rows = fields
        .iter()
        .filter_map(Value::as_object)
        .map(|f| {
            let flag = |key: &str| f.get(key).and_then(Value::as_bool);
            let mut row = Map::new();
            row.insert("name".into(), f.get("name").cloned().unwrap_or(Value::Null));
            row.insert("type".into(), f.get("type").cloned().unwrap_or(Value::Null));
            row.insert("facet".into(), yes_no(flag("facet").unwrap_or(false)));
            row.insert("optional".into(), yes_no(flag("optional").unwrap_or(false)));
            row.insert("index".into(), yes_no(flag("index") != Some(false)));
            row
        })
        .collect();

    let collection_name = result
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| collection_arg(record));

    Some(TableResult {
        columns: ["name", "type", "facet", "optional", "index"]
            .into_iter()
            .map(String::from)
            .collect(),
        rows,
        collection_name,
        total_found: None,
    })
}

/// Keep only `columns`, in column order.
fn project(document: &Map<String, Value>, columns: &[String]) -> Map<String, Value> {
    columns
        .iter()
        .filter_map(|c| document.get(c).map(|v| (c.clone(), v.clone())))
        .collect()
}

// ─── Reply text ─────────────────────────────────────────────────────────────

/// `"Found N result(s) from **collection**."`
pub fn generic_summary(table: &TableResult) -> String {
    let count = table.total_found.unwrap_or(table.rows.len() as u64);
    let noun = if count == 1 { "result" } else { "results" };
    format!(
        "Found {count} {noun} from **{}**.",
        table.collection_name
    )
}

/// Shorten the model's reply when a table already shows the data.
pub fn condense_reply(raw: &str, table: &TableResult) -> String {
    if raw.chars().count() <= MAX_REPLY_CHARS {
        return raw.to_string();
    }

    let first_line = raw.lines().map(str::trim).find(|l| !l.is_empty());
    if let Some(line) = first_line {
        let sentence = first_sentence(line);
        if !sentence.is_empty() && sentence.chars().count() <= MAX_SENTENCE_CHARS {
            return format!("{sentence}.");
        }
    }

    generic_summary(table)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
