//! Cache snapshots: persist every resolved address so a later process can
//! reconstitute entities without fetching them again.

use serde_json::{Map, Value as JsonValue};
use std::path::Path;
use std::sync::Arc;

use super::Resolver;
use crate::cache::CacheEntry;
use crate::entity::{is_resource_document, Entity, SERIALIZED_KEY};
use crate::error::{DapiError, Result};
use crate::lookup::Address;
use crate::normalize;

/// Whether `value` is something [`Resolver::entify`] accepts.
fn is_entifiable(value: &JsonValue) -> bool {
    let serialized = value
        .get(SERIALIZED_KEY)
        .map_or(false, |wrapper| wrapper.get("res").is_some());
    serialized || is_resource_document(value) || normalize::is_error_response(value)
}

impl Resolver {
    /// Rebuild an entity from its serialized form.
    ///
    /// Accepts the `__serialized__` wrapper (restoring its nested `cache`
    /// first, when present), a plain JSON:API document or an error document.
    pub fn entify(&self, value: JsonValue) -> Result<Arc<Entity>> {
        if !is_entifiable(&value) {
            return Err(DapiError::Entify(
                "payload is neither a serialized entity nor a JSON:API document".to_string(),
            ));
        }
        match value {
            JsonValue::Object(mut map) if map.contains_key(SERIALIZED_KEY) => {
                let mut wrapper = map.remove(SERIALIZED_KEY).unwrap_or_default();
                if let Some(JsonValue::Object(cache)) = wrapper.get_mut("cache").map(JsonValue::take) {
                    self.restore_cache(cache);
                }
                let res = wrapper.get_mut("res").map(JsonValue::take).unwrap_or_default();
                Ok(self.attach(res))
            }
            document => Ok(self.attach(document)),
        }
    }

    /// Merge a snapshot into the cache. Entries that look like entities are
    /// rebuilt as entities; everything else is stored as is.
    pub fn restore_cache(&self, cache: Map<String, JsonValue>) {
        for (key, value) in cache {
            let entry = if is_entifiable(&value) {
                match self.entify(value) {
                    Ok(entity) => CacheEntry::Entity(entity),
                    Err(err) => {
                        log::warn!("Dropping snapshot entry {}: {}", key, err);
                        continue;
                    }
                }
            } else {
                CacheEntry::Raw(Arc::new(value))
            };
            // Snapshot entries replace whatever this run already fetched
            self.cache().insert(Address::from(key), entry);
        }
    }

    /// Every cached address with its payload.
    pub fn cache_to_object(&self) -> Map<String, JsonValue> {
        self.cache()
            .entries()
            .into_iter()
            .map(|(address, entry)| (address.as_str().to_string(), entry.to_object()))
            .collect()
    }

    /// Write the cache to a JSON file.
    pub async fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.cache_to_object();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        tokio::fs::write(path, bytes).await?;
        log::info!("Wrote {} cached resources to {}", snapshot.len(), path.display());
        Ok(())
    }

    /// Load a JSON file written by [`Resolver::save_snapshot`] into the cache.
    ///
    /// # Returns
    /// The number of entries read
    pub async fn load_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Map<String, JsonValue> = serde_json::from_slice(&bytes)?;
        let count = snapshot.len();
        self.restore_cache(snapshot);
        log::info!("Restored {} cached resources from {}", count, path.display());
        Ok(count)
    }
}
