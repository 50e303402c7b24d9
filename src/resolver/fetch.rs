use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::ResolverInner;
use crate::cache::{CacheEntry, FetchOutcome};
use crate::entity::{is_resource_document, Entity, PageError};
use crate::error::AbortReport;
use crate::lookup::Address;
use crate::normalize::{self, UNKNOWN_STATUS};

/// Upper bound on fetches of one address in strict mode.
pub const MAX_STRICT_ATTEMPTS: u32 = 20;

const MALFORMED_TITLE: &str = "Malformed resource document";

/// Fetch an address once, or in strict mode until it stops being a missing
/// placeholder. Strict mode turns every other error resource into an abort.
///
/// A payload at a canonical resource address that is not a JSON:API document
/// counts as malformed: strict mode retries it like a missing resource.
pub(super) async fn fetch_with_policy(inner: Arc<ResolverInner>, address: Address) -> FetchOutcome {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let entry = fetch_once(&inner, &address).await;
        if !inner.strict {
            return Ok(entry);
        }

        let (retryable, status, title) = match &entry {
            CacheEntry::Entity(error) if error.is_error() => {
                let page_error = error.page_error().unwrap_or_else(|| PageError {
                    status_code: error.bundle().to_string(),
                    message: String::new(),
                });
                (
                    error.is_missing_placeholder(),
                    page_error.status_code,
                    page_error.message,
                )
            }
            CacheEntry::Raw(_) if inner.endpoints.is_resource_address(&address) => (
                true,
                UNKNOWN_STATUS.to_string(),
                MALFORMED_TITLE.to_string(),
            ),
            _ => return Ok(entry),
        };

        if retryable && attempts < MAX_STRICT_ATTEMPTS {
            log::warn!(
                "Retry {}/{} for {}: {}",
                attempts,
                MAX_STRICT_ATTEMPTS,
                address,
                if entry.is_error() { "resource is missing" } else { "not a JSON:API document" }
            );
            continue;
        }

        log::error!(
            "Strict generation gave up on {} after {} attempt(s): {} {}",
            address,
            attempts,
            status,
            title
        );
        return Err(AbortReport {
            endpoint: address,
            status,
            title,
            attempts,
        });
    }
}

/// One transport call; failures come back normalized as error entities.
async fn fetch_once(inner: &Arc<ResolverInner>, address: &Address) -> CacheEntry {
    log::debug!("Fetching {}", address);
    let payload = match inner.transport.get(address.as_str()).await {
        Ok(payload) => payload,
        Err(err) => normalize::normalize_failure(&err),
    };
    entry_from_payload(inner, payload)
}

/// JSON:API documents (and error documents) become entities; anything else,
/// such as a routing response, is kept as is.
pub(super) fn entry_from_payload(inner: &Arc<ResolverInner>, payload: JsonValue) -> CacheEntry {
    if is_resource_document(&payload) || normalize::is_error_response(&payload) {
        CacheEntry::Entity(Arc::new(Entity::attached(
            payload,
            inner.entity_options.clone(),
            Arc::downgrade(inner),
        )))
    } else {
        CacheEntry::Raw(Arc::new(payload))
    }
}
