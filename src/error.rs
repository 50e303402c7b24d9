use std::fmt;

use thiserror::Error;

use crate::lookup::Address;

/// Main error type for DApi
#[derive(Error, Debug)]
pub enum DapiError {
    /// A lookup lacks the fields needed to build an address and has no slug
    /// to resolve them from
    #[error("Incomplete lookup: {0}")]
    IncompleteLookup(String),

    /// A payload could not be recognized as any known resource shape
    #[error("Unable to create an entity: {0}")]
    Entify(String),

    /// Strict generation hit an unrecoverable error resource
    #[error("Strict generation aborted: {0}")]
    StrictAbort(AbortReport),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid field or relationship pattern
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Convenient Result type using DapiError
pub type Result<T> = std::result::Result<T, DapiError>;

/// What strict mode knew about an endpoint when it gave up.
///
/// Cloneable so every caller coalesced onto the same in-flight fetch receives
/// the same report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortReport {
    pub endpoint: Address,
    pub status: String,
    pub title: String,
    pub attempts: u32,
}

impl fmt::Display for AbortReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} responded {} ({}) after {} attempt(s)",
            self.endpoint, self.status, self.title, self.attempts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DapiError::IncompleteLookup("missing bundle".to_string());
        assert!(err.to_string().contains("Incomplete lookup"));
        assert!(err.to_string().contains("missing bundle"));
    }

    #[test]
    fn test_strict_abort_display() {
        let err = DapiError::StrictAbort(AbortReport {
            endpoint: Address::from("/jsonapi/node/page/abc"),
            status: "404".to_string(),
            title: "Not Found".to_string(),
            attempts: 1,
        });
        let text = err.to_string();
        assert!(text.contains("/jsonapi/node/page/abc"));
        assert!(text.contains("404"));
        assert!(text.contains("Not Found"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DapiError = io_err.into();
        assert!(matches!(err, DapiError::Io(_)));
    }

    #[test]
    fn test_error_from_regex() {
        let regex_err = regex::Regex::new("(").unwrap_err();
        let err: DapiError = regex_err.into();
        assert!(matches!(err, DapiError::Pattern(_)));
    }
}
