use std::collections::HashMap;

use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingMeta {
    pub url: Option<String>,
    pub name: Option<String>,
}

pub type Metadata = HashMap<String, ListingMeta>;

/// Parse a JSON-LD blob into per-listing metadata.
///
/// Two shapes are understood: an object keyed directly by listing id, and a
/// schema.org document (single entity, array, `@graph` or `itemListElement`)
/// whose entries carry an `identifier` or `@id`.
pub fn parse_json_ld(blob: &str) -> Result<Metadata, serde_json::Error> {
    let root: Value = serde_json::from_str(blob)?;
    let mut out = Metadata::new();

    match &root {
        Value::Object(map) if !is_entity(&root) => {
            for (id, entry) in map {
                if entry.is_object() {
                    out.insert(id.clone(), listing_meta(entry));
                }
            }
        }
        _ => collect_entities(&root, &mut out),
    }

    Ok(out)
}

fn is_entity(value: &Value) -> bool {
    ["@type", "@context", "@graph", "itemListElement"]
        .iter()
        .any(|k| value.get(k).is_some())
}

fn collect_entities(value: &Value, out: &mut Metadata) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_entities(item, out);
            }
        }
        Value::Object(_) => {
            if let Some(graph) = value.get("@graph") {
                collect_entities(graph, out);
            }
            if let Some(list) = value.get("itemListElement") {
                collect_entities(list, out);
            }
            // ListItem wrappers keep the listing under "item"
            let entity = value.get("item").unwrap_or(value);
            if let Some(id) = entity_id(entity) {
                out.insert(id, listing_meta(entity));
            }
        }
        _ => {}
    }
}

fn entity_id(entity: &Value) -> Option<String> {
    let raw = entity.get("identifier").or_else(|| entity.get("@id"))?;
    match raw {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn listing_meta(entry: &Value) -> ListingMeta {
    let text = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    ListingMeta {
        url: text("url"),
        name: text("name"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_by_id() {
        let blob = r#"{
            "71234": {"url": "https://example.com/p/71234", "name": "Apartment for sale in Dwarka"},
            "71235": {"name": ""}
        }"#;
        let meta = parse_json_ld(blob).unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(
            meta["71234"].url.as_deref(),
            Some("https://example.com/p/71234")
        );
        assert_eq!(meta["71235"], ListingMeta::default());
    }

    #[test]
    fn item_list_document() {
        let blob = r#"{
            "@context": "https://schema.org",
            "@type": "ItemList",
            "itemListElement": [
                {"@type": "ListItem", "item": {"identifier": 501, "name": "Villa for sale", "url": "https://example.com/501"}},
                {"@type": "ListItem", "item": {"@id": "502", "name": "Builder Floor"}}
            ]
        }"#;
        let meta = parse_json_ld(blob).unwrap();
        assert_eq!(meta["501"].name.as_deref(), Some("Villa for sale"));
        assert_eq!(meta["502"].url, None);
    }

    #[test]
    fn malformed_blob_is_an_error() {
        assert!(parse_json_ld("{not json").is_err());
    }

    #[test]
    fn entries_without_ids_are_ignored() {
        let meta = parse_json_ld(r#"[{"@type": "Organization", "name": "Broker"}]"#).unwrap();
        assert!(meta.is_empty());
    }
}
