//! Entity projection model.
//!
//! An [`Entity`] wraps one JSON:API payload (a single resource, a collection,
//! or a shaped error) and exposes its fields by logical name. Relationship
//! values dereference through the cache of the resolver that produced the
//! entity; the entity only keeps a weak handle to it.

pub mod hooks;
pub mod options;
pub mod payload;
pub mod transform;

pub use hooks::{LibraryParagraphHook, ResolveHook};
pub use options::{EntityOptions, Transformer, ValueProcessor};
pub use payload::{
    classify, is_resource_document, is_truthy, RelationshipRef, Shape, TYPE_SEPARATOR,
};
pub use transform::FieldRules;

use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::cache::CacheEntry;
use crate::normalize::{self, MISSING_ID, UNKNOWN_STATUS};
use crate::resolver::ResolverInner;

/// Prefix of configurable fields; pass `""` for structural names such as
/// `title` or `paragraphs`.
pub const FIELD_PREFIX: &str = "field_";

/// Key of the self-describing wrapper produced when an entity is serialized.
pub const SERIALIZED_KEY: &str = "__serialized__";

static NULL: JsonValue = JsonValue::Null;

fn internal_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^drupal_internal__[a-z]?id$").expect("Invalid regex pattern")
    })
}

/// Path of a field inside the resource object: field set, name.
type FieldPath = [String; 2];

/// A resolved field value.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Scalar(JsonValue),
    Entity(Arc<Entity>),
    /// A reference whose target is not in the cache, e.g. past the depth limit
    Unresolved(RelationshipRef),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&JsonValue> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Arc<Entity>> {
        match self {
            FieldValue::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Scalar(value) => is_truthy(value),
            FieldValue::Entity(_) | FieldValue::Unresolved(_) => true,
        }
    }

    /// JSON rendering: entities as their resource object, unresolved
    /// references as the reference itself.
    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::Scalar(value) => value.clone(),
            FieldValue::Entity(entity) => entity.data().clone(),
            FieldValue::Unresolved(reference) => {
                json!({ "type": reference.resource_type(), "id": reference.id })
            }
        }
    }
}

/// Numeric or string domain id (`drupal_internal__nid` and friends).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InternalId {
    Numeric(i64),
    Text(String),
}

/// What a host needs to render an error page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageError {
    pub status_code: String,
    pub message: String,
}

/// Result of [`Entity::to_props`].
#[derive(Debug, Clone)]
pub enum Props {
    Entity(Arc<Entity>),
    Transformed(JsonValue),
}

pub struct Entity {
    res: JsonValue,
    options: Arc<EntityOptions>,
    owner: Weak<ResolverInner>,
    field_map: OnceLock<BTreeMap<String, FieldPath>>,
}

impl Entity {
    /// Wrap a payload without a resolver; references stay unresolved.
    pub fn new(payload: JsonValue, options: Arc<EntityOptions>) -> Self {
        Self::attached(payload, options, Weak::new())
    }

    pub(crate) fn attached(
        payload: JsonValue,
        options: Arc<EntityOptions>,
        owner: Weak<ResolverInner>,
    ) -> Self {
        let payload = if normalize::is_error_response(&payload) {
            normalize::shape_error(payload)
        } else {
            payload
        };
        let res = if options.transform {
            transform::transform(payload, &options.field_rules)
        } else {
            payload
        };
        Self {
            res,
            options,
            owner,
            field_map: OnceLock::new(),
        }
    }

    /// The resource object (or the array of them for collections).
    pub fn data(&self) -> &JsonValue {
        match self.res.get("data") {
            Some(data @ JsonValue::Object(resource))
                if resource.contains_key("type") && resource.contains_key("id") =>
            {
                data
            }
            Some(data @ JsonValue::Array(_)) => data,
            _ if self.res.get("type").is_some() && self.res.get("id").is_some() => &self.res,
            _ => &NULL,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.data().is_array()
    }

    /// Full resource type, e.g. `node--article`.
    pub fn resource_type(&self) -> &str {
        self.data()
            .get("type")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
    }

    pub fn entity_type(&self) -> &str {
        self.resource_type()
            .split(TYPE_SEPARATOR)
            .next()
            .unwrap_or_default()
    }

    pub fn bundle(&self) -> &str {
        self.resource_type()
            .split(TYPE_SEPARATOR)
            .nth(1)
            .unwrap_or_default()
    }

    pub fn uuid(&self) -> &str {
        self.data()
            .get("id")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
    }

    pub fn attributes(&self) -> Option<&Map<String, JsonValue>> {
        self.data().get("attributes").and_then(JsonValue::as_object)
    }

    pub fn relationship_groups(&self) -> &[String] {
        &self.options.relationship_groups
    }

    /// Domain id from the internal id attribute.
    pub fn internal_id(&self) -> Option<InternalId> {
        let (_, value) = self
            .attributes()?
            .iter()
            .find(|(name, _)| internal_id_pattern().is_match(name))?;
        match value {
            JsonValue::Number(n) => n.as_i64().map(InternalId::Numeric),
            JsonValue::String(s) => Some(InternalId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.entity_type() == "error"
    }

    /// An error synthesized without a definitive status; the only kind of
    /// error strict mode retries.
    pub fn is_missing_placeholder(&self) -> bool {
        self.is_error() && self.uuid() == MISSING_ID && self.bundle() == UNKNOWN_STATUS
    }

    pub fn page_error(&self) -> Option<PageError> {
        if !self.is_error() {
            return None;
        }
        let message = self
            .res
            .get("errors")
            .and_then(|errors| errors.get(0))
            .and_then(|error| error.get("title"))
            .and_then(JsonValue::as_str)
            .filter(|title| !title.is_empty())
            .unwrap_or("Unknown Error");
        Some(PageError {
            status_code: self.bundle().to_string(),
            message: message.to_string(),
        })
    }

    /// Relationship field names of a group that match the relationship tests.
    pub fn relationship_field_names(&self, group: &str) -> Vec<&str> {
        self.data()
            .get(group)
            .and_then(JsonValue::as_object)
            .map(|fields| {
                fields
                    .keys()
                    .filter(|name| self.options.is_relationship_field(name))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn field_map(&self) -> &BTreeMap<String, FieldPath> {
        self.field_map.get_or_init(|| {
            let mut map = BTreeMap::new();
            if self.is_collection() {
                return map;
            }
            let path = |group: &str, name: &str| [group.to_string(), name.to_string()];
            if let Some(attributes) = self.attributes() {
                for name in attributes.keys() {
                    map.insert(name.clone(), path("attributes", name));
                }
            }
            for group in &self.options.relationship_groups {
                for name in self.relationship_field_names(group) {
                    map.insert(name.to_string(), path(group, name));
                }
            }
            map
        })
    }

    /// Every field name known to this entity, sorted.
    pub fn field_names(&self) -> Vec<&str> {
        self.field_map().keys().map(String::as_str).collect()
    }

    pub fn has_field(&self, name: &str, prefix: &str) -> bool {
        self.field_map().contains_key(&format!("{}{}", prefix, name))
    }

    /// Raw value of a field.
    pub fn field(&self, name: &str, prefix: &str) -> Option<&JsonValue> {
        let path = self.field_map().get(&format!("{}{}", prefix, name))?;
        path.iter()
            .try_fold(self.data(), |value, key| value.get(key.as_str()))
    }

    /// First value of a field, with references dereferenced.
    pub fn value(&self, name: &str, prefix: &str) -> Option<FieldValue> {
        let raw = self.field(name, prefix)?;
        if let Some(processor) = self.options.value_processor(&format!("{}{}", prefix, name)) {
            return processor(self, raw);
        }
        self.field_value(raw, 0)
    }

    /// Every value of a field, dereferenced, falsy values dropped.
    pub fn all_values(&self, name: &str, prefix: &str) -> Vec<FieldValue> {
        let Some(mut fields) = self.field(name, prefix) else {
            return Vec::new();
        };
        if let Some(data @ JsonValue::Array(_)) = fields.get("data") {
            fields = data;
        }
        let resolved: Vec<FieldValue> = match fields {
            JsonValue::Array(items) => items
                .iter()
                .filter_map(|item| self.field_value(item, 0))
                .collect(),
            single => self.field_value(single, 0).into_iter().collect(),
        };
        resolved.into_iter().filter(FieldValue::is_truthy).collect()
    }

    fn field_value(&self, structure: &JsonValue, index: usize) -> Option<FieldValue> {
        let mut value = structure;
        if let Some(data) = structure.get("data") {
            match data {
                JsonValue::Array(items) => value = items.get(index).unwrap_or(&NULL),
                data if is_truthy(data) => value = data,
                _ => {}
            }
        }
        if let Some(item) = value
            .as_array()
            .and_then(|items| items.get(index))
            .filter(|item| is_truthy(item))
        {
            value = item;
        }
        match classify(value) {
            Shape::Reference(reference) => self.resolve_reference(&reference),
            Shape::Scalar(JsonValue::Null) => None,
            _ => Some(FieldValue::Scalar(value.clone())),
        }
    }

    fn resolve_reference(&self, reference: &RelationshipRef) -> Option<FieldValue> {
        let cached = self
            .owner
            .upgrade()
            .and_then(|owner| owner.cached_reference(reference));
        match cached {
            Some(CacheEntry::Entity(entity)) => {
                // Broken references read as absent
                if entity.is_error() {
                    return None;
                }
                match self.options.hooks().iter().find(|hook| hook.applies(reference)) {
                    Some(hook) => hook.substitute(&entity),
                    None => Some(FieldValue::Entity(entity)),
                }
            }
            Some(CacheEntry::Raw(raw)) => Some(FieldValue::Scalar(raw.as_ref().clone())),
            // Not fetched yet, or beyond the traversal depth
            None => Some(FieldValue::Unresolved(reference.clone())),
        }
    }

    /// Items of a collection as entities sharing this entity's resolver.
    pub fn members(&self) -> Vec<Arc<Entity>> {
        match self.data() {
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    Arc::new(Entity::attached(
                        json!({ "data": item }),
                        self.options.clone(),
                        self.owner.clone(),
                    ))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Run the bundle's transformer, if any.
    pub fn to_props(self: &Arc<Self>, payload: Option<&JsonValue>) -> Props {
        match self.options.transformer(self.bundle()) {
            Some(transformer) => Props::Transformed(transformer(self, payload)),
            None => Props::Entity(self.clone()),
        }
    }

    /// The (transformed) payload; enough to reconstitute this entity.
    pub fn to_object(&self) -> &JsonValue {
        &self.res
    }
}

#[derive(Serialize)]
struct SerializedEntity<'a> {
    res: &'a JsonValue,
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(SERIALIZED_KEY, &SerializedEntity { res: &self.res })?;
        map.end()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON:API '{}' entity of bundle '{}'. Has fields: {}.",
            self.entity_type(),
            self.bundle(),
            self.field_names().join(", ")
        )
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.resource_type())
            .field("id", &self.uuid())
            .field("collection", &self.is_collection())
            .finish()
    }
}
