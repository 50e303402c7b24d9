//! # In-memory transport
//!
//! `MemoryTransport` serves payloads from a map instead of the network. It
//! records how often each endpoint was requested, can queue one-shot failures
//! ahead of a route's payload, and can delay every response so concurrent
//! callers genuinely overlap.
//!
//! ```rust
//! use dapi::transport::{MemoryTransport, Transport};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = MemoryTransport::new();
//!     transport.insert("/jsonapi/node/page/u1", json!({"data": {"type": "node--page", "id": "u1"}}));
//!     transport.fail_next("/jsonapi/node/page/u1", None);
//!
//!     assert!(transport.get("/jsonapi/node/page/u1").await.is_err());
//!     assert!(transport.get("/jsonapi/node/page/u1").await.is_ok());
//!     assert_eq!(transport.calls("/jsonapi/node/page/u1"), 2);
//! }
//! ```

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{Transport, TransportError};

#[derive(Default)]
struct Routes {
    payloads: HashMap<String, JsonValue>,
    failures: HashMap<String, VecDeque<Option<u16>>>,
    calls: HashMap<String, usize>,
}

#[derive(Default)]
pub struct MemoryTransport {
    routes: Mutex<Routes>,
    latency: Option<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Serve `payload` for `endpoint` once queued failures are used up.
    pub fn insert(&self, endpoint: &str, payload: JsonValue) {
        self.routes()
            .payloads
            .insert(endpoint.to_string(), payload);
    }

    /// Fail the next request for `endpoint` with `status` (`None` = no response).
    pub fn fail_next(&self, endpoint: &str, status: Option<u16>) {
        self.routes()
            .failures
            .entry(endpoint.to_string())
            .or_default()
            .push_back(status);
    }

    /// Number of requests made for `endpoint`.
    pub fn calls(&self, endpoint: &str) -> usize {
        self.routes().calls.get(endpoint).copied().unwrap_or(0)
    }

    /// Number of requests made for any endpoint.
    pub fn total_calls(&self) -> usize {
        self.routes().calls.values().sum()
    }

    fn routes(&self) -> MutexGuard<'_, Routes> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get(&self, endpoint: &str) -> std::result::Result<JsonValue, TransportError> {
        let reply = {
            let mut routes = self.routes();
            *routes.calls.entry(endpoint.to_string()).or_insert(0) += 1;
            match routes
                .failures
                .get_mut(endpoint)
                .and_then(|queue| queue.pop_front())
            {
                Some(Some(status)) => Err(TransportError::with_status(status, endpoint)),
                Some(None) => Err(TransportError::no_response(endpoint)),
                None => routes
                    .payloads
                    .get(endpoint)
                    .cloned()
                    .ok_or_else(|| TransportError::with_status(404, endpoint)),
            }
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        reply
    }
}

/// A single-resource JSON:API document as a CMS would serve it.
pub fn resource_document(
    resource_type: &str,
    id: &str,
    attributes: JsonValue,
    relationships: JsonValue,
) -> JsonValue {
    json!({
        "jsonapi": { "version": "1.0" },
        "data": resource(resource_type, id, attributes, relationships),
        "links": { "self": { "href": format!("/jsonapi/{}", id) } }
    })
}

/// A collection JSON:API document.
pub fn collection_document(items: Vec<JsonValue>) -> JsonValue {
    json!({
        "jsonapi": { "version": "1.0" },
        "data": items,
    })
}

/// A bare resource object, as found inside `data`.
pub fn resource(
    resource_type: &str,
    id: &str,
    attributes: JsonValue,
    relationships: JsonValue,
) -> JsonValue {
    let mut data = Map::new();
    data.insert("type".to_string(), json!(resource_type));
    data.insert("id".to_string(), json!(id));
    data.insert("attributes".to_string(), attributes);
    if !relationships.is_null() {
        data.insert("relationships".to_string(), relationships);
    }
    data.insert(
        "links".to_string(),
        json!({ "self": { "href": format!("/jsonapi/{}", id) } }),
    );
    JsonValue::Object(data)
}

/// A relationship field pointing at one resource.
pub fn to_one(resource_type: &str, id: &str) -> JsonValue {
    json!({
        "data": { "type": resource_type, "id": id },
        "links": { "self": { "href": "relationship" } }
    })
}

/// A relationship field pointing at several resources.
pub fn to_many(targets: &[(&str, &str)]) -> JsonValue {
    let data: Vec<JsonValue> = targets
        .iter()
        .map(|(resource_type, id)| json!({ "type": resource_type, "id": id }))
        .collect();
    json!({
        "data": data,
        "links": { "self": { "href": "relationship" } }
    })
}
