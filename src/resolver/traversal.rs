use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::Resolver;
use crate::entity::{classify, Entity, RelationshipRef, Shape};
use crate::error::Result;
use crate::lookup::{Address, Depth, Lookup};

/// Collect every reference inside a raw relationship value, walking `data`
/// wrappers, sequences and nested objects.
pub fn collect_references(value: &JsonValue, found: &mut Vec<RelationshipRef>) {
    match classify(value) {
        Shape::Reference(reference) => found.push(reference),
        Shape::Sequence(items) => {
            for item in items {
                collect_references(item, found);
            }
        }
        Shape::Object(fields) => {
            for field in fields.values() {
                collect_references(field, found);
            }
        }
        Shape::Scalar(_) => {}
    }
}

impl Resolver {
    /// Resolve everything an entity references, `depth` hops deep.
    ///
    /// Children are fetched concurrently and each expands its own
    /// relationships one hop shallower. Addresses already cached or in flight
    /// are skipped, which makes cyclic graphs terminate. The returned future
    /// completes once every child sub-tree has settled.
    pub fn load_relationships(
        &self,
        entity: &Arc<Entity>,
        depth: Depth,
    ) -> BoxFuture<'static, Result<()>> {
        let resolver = self.clone();
        let entity = entity.clone();
        async move {
            if depth.is_exhausted() || entity.is_collection() {
                return Ok(());
            }
            let pending = resolver.pending_lookups(&entity);
            if pending.is_empty() {
                return Ok(());
            }
            log::debug!(
                "Expanding {} relationship(s) of {} {}",
                pending.len(),
                entity.resource_type(),
                entity.uuid()
            );
            let children = pending
                .into_values()
                .map(|lookup| resolver.get_entity(lookup, depth.descend()));
            // A strict abort drops the remaining siblings; their fetches
            // still land in the cache.
            try_join_all(children).await?;
            Ok(())
        }
        .boxed()
    }

    /// Lookups for referenced resources nobody has fetched yet, keyed by
    /// address so a resource referenced twice is scheduled once.
    fn pending_lookups(&self, entity: &Entity) -> BTreeMap<Address, Lookup> {
        let mut references = Vec::new();
        for group in entity.relationship_groups() {
            let Some(fields) = entity.data().get(group) else {
                continue;
            };
            for name in entity.relationship_field_names(group) {
                if let Some(value) = fields.get(name) {
                    collect_references(value, &mut references);
                }
            }
        }

        // Skip anything cached or in flight
        let mut pending = BTreeMap::new();
        for reference in references {
            let lookup = reference.to_lookup();
            match self.endpoints().address(&lookup) {
                Ok(address) if !self.cache().was_traversed(&address) => {
                    pending.insert(address, lookup);
                }
                Ok(_) => {}
                Err(err) => log::warn!("Skipping reference {:?}: {}", reference, err),
            }
        }
        pending
    }
}
