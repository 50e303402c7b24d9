//! Parse-time classification of raw payload values.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::lookup::Lookup;

/// Separator between entity type and bundle in a resource type.
pub const TYPE_SEPARATOR: &str = "--";

/// A typed reference to another resource, e.g. `{"type": "node--page", "id": "…"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RelationshipRef {
    pub entity_type: String,
    pub bundle: String,
    pub id: String,
}

impl RelationshipRef {
    /// Recognize a reference object. The type must contain the separator
    /// past its second character and the id must be a non-empty string.
    pub fn parse(value: &JsonValue) -> Option<Self> {
        let object = value.as_object()?;
        let resource_type = object.get("type")?.as_str()?;
        let id = object.get("id")?.as_str().filter(|id| !id.is_empty())?;
        let at = resource_type.find(TYPE_SEPARATOR)?;
        if at <= 1 {
            return None;
        }
        let (entity_type, rest) = resource_type.split_at(at);
        let bundle = rest[TYPE_SEPARATOR.len()..]
            .split(TYPE_SEPARATOR)
            .next()
            .unwrap_or_default();
        Some(Self {
            entity_type: entity_type.to_string(),
            bundle: bundle.to_string(),
            id: id.to_string(),
        })
    }

    pub fn to_lookup(&self) -> Lookup {
        Lookup::new(&self.entity_type, &self.bundle, &self.id)
    }

    pub fn resource_type(&self) -> String {
        format!("{}{}{}", self.entity_type, TYPE_SEPARATOR, self.bundle)
    }
}

/// What a raw value is, decided once at the parsing boundary.
#[derive(Debug)]
pub enum Shape<'a> {
    Reference(RelationshipRef),
    Sequence(&'a [JsonValue]),
    Object(&'a Map<String, JsonValue>),
    Scalar(&'a JsonValue),
}

pub fn classify(value: &JsonValue) -> Shape<'_> {
    if let Some(reference) = RelationshipRef::parse(value) {
        return Shape::Reference(reference);
    }
    match value {
        JsonValue::Array(items) => Shape::Sequence(items),
        JsonValue::Object(map) => Shape::Object(map),
        scalar => Shape::Scalar(scalar),
    }
}

/// A JSON:API document: one resource under `data`, a `data` array, or an
/// explicit `jsonapi.version` envelope.
pub fn is_resource_document(value: &JsonValue) -> bool {
    if value.pointer("/jsonapi/version").is_some() {
        return true;
    }
    match value.get("data") {
        Some(JsonValue::Object(resource)) => resource.contains_key("type"),
        Some(JsonValue::Array(_)) => true,
        _ => false,
    }
}

/// Truthiness used when dropping empty field values: null, false, zero and
/// the empty string are falsy.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}
