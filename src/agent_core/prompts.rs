//! System prompt construction.
//!
//! Rebuilt for every send from the live collection catalogue so the model's
//! view of the data always matches what the tools will see.

use crate::search_client::CollectionSchema;

// ─── System prompt ──────────────────────────────────────────────────────────

/// Identity and intro: static portion of the system prompt.
const SYSTEM_PROMPT_INTRO: &str = "\
You are a data assistant for a search engine dashboard. You answer questions about \
the user's collections and documents by calling the provided functions.";

/// Behavioral rules: static portion appended after the catalogue.
const SYSTEM_PROMPT_RULES: &str = "\
Rules:\n\
1. For READ operations: call the function immediately, no need to ask.\n\
2. For WRITE operations (create, update, delete): call the function directly. The \
system shows the user a confirmation prompt before executing. Do NOT ask for \
confirmation in text.\n\
3. If the user denies an action, acknowledge it and do not retry.\n\
4. Results are shown to the user as a table. Do NOT repeat rows or list documents \
in your reply; give a one or two sentence summary instead.\n\
5. Pass filter_by and sort_by expressions in the search engine's own syntax, e.g. \
price:>100 && in_stock:true or created_at:desc.\n\
6. Use q='*' to match every document. Use query_by with the collection's string fields.\n\
7. Documents for create_document and update_document are JSON object strings.\n\
8. Only report results you actually received. Never invent documents or counts.";

/// Build the system prompt for the current catalogue and selection.
pub fn build_system_prompt(collections: &[CollectionSchema], selected: Option<&str>) -> String {
    let catalogue = describe_catalogue(collections);
    let focus = match selected {
        Some(name) if !name.is_empty() => format!(
            "\n\nThe user is currently viewing the '{name}' collection. Assume questions \
             refer to it unless they name another collection."
        ),
        _ => String::new(),
    };
    format!("{SYSTEM_PROMPT_INTRO}\n\n{catalogue}{focus}\n\n{SYSTEM_PROMPT_RULES}")
}

fn describe_catalogue(collections: &[CollectionSchema]) -> String {
    if collections.is_empty() {
        return "No collections are loaded yet. Call list_collections to discover them."
            .to_string();
    }

    let mut out = String::from("Available collections:\n");
    for collection in collections {
        out.push_str(&format!(
            "- {} ({} documents)\n",
            collection.name, collection.num_documents
        ));

        let hidden = collection.fields.iter().filter(|f| f.is_embedding()).count();
        for field in collection.fields.iter().filter(|f| !f.is_embedding()) {
            let mut flags = Vec::new();
            if field.optional {
                flags.push("optional");
            }
            if field.facet {
                flags.push("facet");
            }
            if flags.is_empty() {
                out.push_str(&format!("    {}: {}\n", field.name, field.field_type));
            } else {
                out.push_str(&format!(
                    "    {}: {} [{}]\n",
                    field.name,
                    field.field_type,
                    flags.join(", ")
                ));
            }
        }
        if hidden > 0 {
            out.push_str(&format!("    ({hidden} embedding field(s) not shown)\n"));
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_client::CollectionField;

    fn field(name: &str, field_type: &str, facet: bool, optional: bool) -> CollectionField {
        CollectionField {
            name: name.into(),
            field_type: field_type.into(),
            facet,
            optional,
            index: None,
            num_dim: None,
            embed: None,
        }
    }

    fn products() -> CollectionSchema {
        let mut embedding = field("vec", "float[]", false, false);
        embedding.num_dim = Some(384);
        CollectionSchema {
            name: "products".into(),
            num_documents: 120,
            fields: vec![
                field("title", "string", false, false),
                field("brand", "string", true, true),
                embedding,
            ],
            default_sorting_field: None,
            created_at: None,
        }
    }

    #[test]
    fn test_prompt_lists_fields_with_flags() {
        let prompt = build_system_prompt(&[products()], None);
        assert!(prompt.contains("- products (120 documents)"));
        assert!(prompt.contains("title: string\n"));
        assert!(prompt.contains("brand: string [optional, facet]"));
    }

    #[test]
    fn test_prompt_hides_embeddings_but_counts_them() {
        let prompt = build_system_prompt(&[products()], None);
        assert!(!prompt.contains("vec: float[]"));
        assert!(prompt.contains("(1 embedding field(s) not shown)"));
    }

    #[test]
    fn test_prompt_mentions_selected_collection() {
        let prompt = build_system_prompt(&[products()], Some("products"));
        assert!(prompt.contains("currently viewing the 'products' collection"));

        let prompt = build_system_prompt(&[products()], None);
        assert!(!prompt.contains("currently viewing"));
    }

    #[test]
    fn test_prompt_without_catalogue() {
        let prompt = build_system_prompt(&[], None);
        assert!(prompt.contains("Call list_collections"));
        assert!(prompt.contains("Do NOT ask for confirmation"));
    }
}
