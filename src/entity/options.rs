use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::hooks::{LibraryParagraphHook, ResolveHook};
use super::transform::FieldRules;
use super::{Entity, FieldValue};
use crate::config::EntityConfig;
use crate::error::{DapiError, Result};

/// Replaces default resolution of one named field. Receives the entity and
/// the raw field value.
pub type ValueProcessor = Arc<dyn Fn(&Entity, &JsonValue) -> Option<FieldValue> + Send + Sync>;

/// Per-bundle post-processing producing render-ready props. Receives the
/// entity and an optional caller payload.
pub type Transformer = Arc<dyn Fn(&Arc<Entity>, Option<&JsonValue>) -> JsonValue + Send + Sync>;

pub const DEFAULT_RELATIONSHIP_TESTS: [&str; 2] = [r"^field_", r"^paragraphs$"];

pub const DEFAULT_RELATIONSHIP_GROUP: &str = "relationships";

/// How payloads are projected into entities.
pub struct EntityOptions {
    /// Apply envelope stripping and field cleaning on construction
    pub transform: bool,
    pub field_rules: FieldRules,
    /// Relationship field names must match one of these
    pub relationship_tests: Vec<Regex>,
    pub relationship_groups: Vec<String>,
    value_processors: HashMap<String, ValueProcessor>,
    transformers: HashMap<String, Transformer>,
    hooks: Vec<Arc<dyn ResolveHook>>,
}

impl EntityOptions {
    pub fn from_config(config: &EntityConfig) -> Result<Self> {
        let relationship_tests = config
            .relationship_tests
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if config.relationship_groups.is_empty() {
            return Err(DapiError::Config(
                "entity.relationship_groups must name at least one group".to_string(),
            ));
        }
        Ok(Self {
            transform: config.transform,
            field_rules: FieldRules::new(&config.field_tests[..])?,
            relationship_tests,
            relationship_groups: config.relationship_groups.clone(),
            ..Self::default()
        })
    }

    /// Override resolution of the field with this full name.
    pub fn with_value_processor<F>(mut self, field: &str, processor: F) -> Self
    where
        F: Fn(&Entity, &JsonValue) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.value_processors
            .insert(field.to_string(), Arc::new(processor));
        self
    }

    /// Post-process entities of this bundle in `Entity::to_props`.
    pub fn with_transformer<F>(mut self, bundle: &str, transformer: F) -> Self
    where
        F: Fn(&Arc<Entity>, Option<&JsonValue>) -> JsonValue + Send + Sync + 'static,
    {
        self.transformers
            .insert(bundle.to_string(), Arc::new(transformer));
        self
    }

    /// Toggle envelope stripping and field cleaning.
    pub fn with_transform(mut self, transform: bool) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ResolveHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Drop every registered resolve hook, including the default ones.
    pub fn without_hooks(mut self) -> Self {
        self.hooks.clear();
        self
    }

    pub fn is_relationship_field(&self, name: &str) -> bool {
        self.relationship_tests.iter().any(|test| test.is_match(name))
    }

    pub(crate) fn value_processor(&self, field: &str) -> Option<&ValueProcessor> {
        self.value_processors.get(field)
    }

    pub(crate) fn transformer(&self, bundle: &str) -> Option<&Transformer> {
        self.transformers.get(bundle)
    }

    pub(crate) fn hooks(&self) -> &[Arc<dyn ResolveHook>] {
        &self.hooks
    }
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            transform: true,
            field_rules: FieldRules::default(),
            relationship_tests: DEFAULT_RELATIONSHIP_TESTS
                .iter()
                .map(|p| Regex::new(p).expect("Invalid regex pattern"))
                .collect(),
            relationship_groups: vec![DEFAULT_RELATIONSHIP_GROUP.to_string()],
            value_processors: HashMap::new(),
            transformers: HashMap::new(),
            hooks: vec![Arc::new(LibraryParagraphHook)],
        }
    }
}

impl fmt::Debug for EntityOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityOptions")
            .field("transform", &self.transform)
            .field("relationship_tests", &self.relationship_tests)
            .field("relationship_groups", &self.relationship_groups)
            .field("value_processors", &self.value_processors.keys().collect::<Vec<_>>())
            .field("transformers", &self.transformers.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
