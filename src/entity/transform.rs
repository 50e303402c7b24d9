//! Payload cleaning: strips envelope metadata and filters resource fields to
//! an allow-list before a payload is wrapped as an entity.

use regex::Regex;
use serde_json::{json, Map, Value as JsonValue};

use crate::error::Result;

/// Field sets that are filtered on every resource.
pub const FIELD_SETS: [&str; 2] = ["attributes", "relationships"];

pub const DEFAULT_FIELD_TESTS: [&str; 3] = [
    r"^field_",
    r"^drupal_internal__[a-z]?id$",
    r"^(label|title|status|path|paragraphs|thumbnail|meta|uri|filemime|filesize|filename)$",
];

/// Allow-list of field name patterns.
#[derive(Debug, Clone)]
pub struct FieldRules {
    tests: Vec<Regex>,
}

impl FieldRules {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let tests = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { tests })
    }

    pub fn allows(&self, name: &str) -> bool {
        self.tests.iter().any(|test| test.is_match(name))
    }
}

impl Default for FieldRules {
    fn default() -> Self {
        Self::new(&DEFAULT_FIELD_TESTS[..]).expect("Invalid regex pattern")
    }
}

/// Remove `jsonapi` and `links`, wrap a bare resource in `data`, and clean
/// the field sets of the resource (or of every collection item).
pub fn transform(mut res: JsonValue, rules: &FieldRules) -> JsonValue {
    if let JsonValue::Object(map) = &mut res {
        map.remove("jsonapi");
        map.remove("links");
    }
    if res.get("data").is_none() && res.get("type").is_some() {
        res = json!({ "data": res });
    }
    match res.get_mut("data") {
        Some(JsonValue::Object(resource)) => clean_resource(resource, rules),
        Some(JsonValue::Array(items)) => {
            for item in items.iter_mut() {
                if let JsonValue::Object(resource) = item {
                    clean_resource(resource, rules);
                }
            }
        }
        _ => {}
    }
    res
}

fn clean_resource(resource: &mut Map<String, JsonValue>, rules: &FieldRules) {
    resource.remove("links");
    for set in FIELD_SETS {
        let fields = resource.remove(set);
        resource.insert(
            set.to_string(),
            JsonValue::Object(clean_fields(fields, rules)),
        );
    }
}

/// Keep allowed fields only, each cleaned.
pub fn clean_fields(fields: Option<JsonValue>, rules: &FieldRules) -> Map<String, JsonValue> {
    match fields {
        Some(JsonValue::Object(fields)) => fields
            .into_iter()
            .filter(|(name, _)| rules.allows(name))
            .map(|(name, value)| (name, clean_field(value)))
            .collect(),
        _ => Map::new(),
    }
}

/// Drop self links from a field value and everything nested in it.
pub fn clean_field(field: JsonValue) -> JsonValue {
    match field {
        JsonValue::Object(mut map) => {
            let self_link = map
                .get("links")
                .and_then(|links| links.get("self"))
                .is_some();
            if self_link {
                map.remove("links");
            }
            JsonValue::Object(
                map.into_iter()
                    .map(|(key, value)| (key, clean_field(value)))
                    .collect(),
            )
        }
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(clean_field).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_cleaning_keeps_allowed_names() {
        let rules = FieldRules::default();
        let cleaned = clean_fields(
            Some(json!({ "field_title": "x", "secret_internal": "y" })),
            &rules,
        );
        assert_eq!(cleaned.get("field_title"), Some(&json!("x")));
        assert!(cleaned.get("secret_internal").is_none());
    }

    #[test]
    fn test_default_rules() {
        let rules = FieldRules::default();
        assert!(rules.allows("field_body"));
        assert!(rules.allows("drupal_internal__nid"));
        assert!(rules.allows("drupal_internal__id"));
        assert!(rules.allows("title"));
        assert!(rules.allows("paragraphs"));
        assert!(!rules.allows("changed"));
        assert!(!rules.allows("revision_uid"));
    }

    #[test]
    fn test_transform_strips_envelope() {
        let res = json!({
            "jsonapi": { "version": "1.0" },
            "links": { "self": { "href": "x" } },
            "data": {
                "type": "node--page",
                "id": "u1",
                "links": { "self": { "href": "y" } },
                "attributes": { "title": "Home", "changed": "2024-01-01" },
                "relationships": {
                    "field_hero": {
                        "data": { "type": "media--image", "id": "m1" },
                        "links": { "self": { "href": "z" }, "related": { "href": "w" } }
                    },
                    "uid": { "data": { "type": "user--user", "id": "u" } }
                }
            }
        });
        let cleaned = transform(res, &FieldRules::default());

        assert!(cleaned.get("jsonapi").is_none());
        assert!(cleaned.get("links").is_none());
        assert!(cleaned["data"].get("links").is_none());
        assert_eq!(cleaned["data"]["attributes"], json!({ "title": "Home" }));
        assert_eq!(
            cleaned["data"]["relationships"],
            json!({ "field_hero": { "data": { "type": "media--image", "id": "m1" } } })
        );
    }

    #[test]
    fn test_transform_wraps_bare_resource() {
        let cleaned = transform(
            json!({ "type": "node--page", "id": "u1", "attributes": { "title": "A" } }),
            &FieldRules::default(),
        );
        assert_eq!(cleaned["data"]["id"], "u1");
        assert_eq!(cleaned["data"]["relationships"], json!({}));
    }

    #[test]
    fn test_transform_cleans_collection_items() {
        let cleaned = transform(
            json!({ "data": [
                { "type": "node--page", "id": "a", "attributes": { "title": "A", "langcode": "en" } },
                { "type": "node--page", "id": "b", "attributes": { "title": "B" } }
            ]}),
            &FieldRules::default(),
        );
        assert_eq!(cleaned["data"][0]["attributes"], json!({ "title": "A" }));
        assert_eq!(cleaned["data"][1]["attributes"], json!({ "title": "B" }));
    }

    #[test]
    fn test_clean_field_nested_sequences() {
        let field = json!({
            "data": [
                { "type": "file--file", "id": "f1", "meta": { "links": { "self": { "href": "x" } }, "alt": "A" } }
            ]
        });
        let cleaned = clean_field(field);
        assert_eq!(
            cleaned,
            json!({ "data": [ { "type": "file--file", "id": "f1", "meta": { "alt": "A" } } ] })
        );
    }
}
