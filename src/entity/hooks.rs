//! Post-resolution hooks applied when a field value dereferences to an entity.

use std::sync::Arc;

use super::payload::RelationshipRef;
use super::{Entity, FieldValue, FIELD_PREFIX};

/// Substitutes what a resolved reference yields to callers.
pub trait ResolveHook: Send + Sync {
    /// Whether this hook handles references of this type.
    fn applies(&self, reference: &RelationshipRef) -> bool;

    /// Value returned in place of `resolved`.
    fn substitute(&self, resolved: &Arc<Entity>) -> Option<FieldValue>;
}

/// Paragraph library wrappers resolve to the first paragraph of the reused
/// library item, so templates never see the `from_library` indirection.
pub struct LibraryParagraphHook;

impl ResolveHook for LibraryParagraphHook {
    fn applies(&self, reference: &RelationshipRef) -> bool {
        reference.entity_type == "paragraph" && reference.bundle == "from_library"
    }

    fn substitute(&self, resolved: &Arc<Entity>) -> Option<FieldValue> {
        match resolved.value("reusable_paragraph", FIELD_PREFIX)? {
            FieldValue::Entity(item) => item.value("paragraphs", ""),
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_hook_applies_to_from_library_only() {
        let hook = LibraryParagraphHook;
        let wrapper = RelationshipRef {
            entity_type: "paragraph".to_string(),
            bundle: "from_library".to_string(),
            id: "p1".to_string(),
        };
        let text = RelationshipRef {
            bundle: "text".to_string(),
            ..wrapper.clone()
        };
        assert!(hook.applies(&wrapper));
        assert!(!hook.applies(&text));
    }
}
