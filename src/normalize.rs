//! Error normalization: every failure becomes a JSON:API error document that
//! the entity constructor shapes into an error entity.

use serde_json::{json, Value as JsonValue};

use crate::transport::TransportError;

/// Placeholder id of every synthesized error resource.
pub const MISSING_ID: &str = "missing";

/// Status used when no definitive status is known.
pub const UNKNOWN_STATUS: &str = "520";

/// Normalized failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotAuthorized,
    NotFound,
    Unknown,
}

impl ErrorKind {
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(403) => ErrorKind::NotAuthorized,
            Some(404) => ErrorKind::NotFound,
            _ => ErrorKind::Unknown,
        }
    }

    pub fn status(self) -> &'static str {
        match self {
            ErrorKind::NotAuthorized => "403",
            ErrorKind::NotFound => "404",
            ErrorKind::Unknown => UNKNOWN_STATUS,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ErrorKind::NotAuthorized => "Not Authorized",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::Unknown => "Unknown Error",
        }
    }
}

/// A JSON:API error document.
pub fn error_document(status: &str, title: &str) -> JsonValue {
    json!({
        "jsonapi": {
            "version": "1.0",
            "meta": {
                "links": {
                    "self": { "href": "http://jsonapi.org/format/1.0/" }
                }
            }
        },
        "errors": [
            { "title": title, "status": status }
        ]
    })
}

/// Error document for a failed fetch.
pub fn normalize_failure(err: &TransportError) -> JsonValue {
    let kind = ErrorKind::from_status(err.status);
    log::warn!(
        "Normalizing transport failure as {} {}: {}",
        kind.status(),
        kind.title(),
        err.message
    );
    error_document(kind.status(), kind.title())
}

/// An `errors` array is present and non-empty and there is no `data`.
pub fn is_error_response(payload: &JsonValue) -> bool {
    let has_errors = payload
        .get("errors")
        .and_then(JsonValue::as_array)
        .map_or(false, |errors| !errors.is_empty());
    has_errors && payload.get("data").map_or(true, JsonValue::is_null)
}

/// Synthesize the placeholder `data` block of an error response, using the
/// first error's status as the bundle.
pub fn shape_error(mut payload: JsonValue) -> JsonValue {
    let status = payload
        .get("errors")
        .and_then(|errors| errors.get(0))
        .and_then(|error| error.get("status"))
        .and_then(|status| match status {
            JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| UNKNOWN_STATUS.to_string());

    if let JsonValue::Object(map) = &mut payload {
        map.insert(
            "data".to_string(),
            json!({
                "type": format!("error--{}", status),
                "id": MISSING_ID,
                "attributes": {}
            }),
        );
    }
    payload
}
