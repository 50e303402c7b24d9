use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::{Transport, TransportError};
use crate::error::{DapiError, Result};

const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

/// JSON:API client over HTTP
///
/// Endpoints are appended to the base URL verbatim, so a base URL carrying a
/// path prefix keeps it.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a new HTTP transport
    ///
    /// # Arguments
    ///
    /// * `base_url` - Absolute URL of the CMS, e.g. "https://cms.example.com"
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| DapiError::Config(format!("Invalid base_url {}: {}", base_url, e)))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Full URL requested for an endpoint
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, endpoint: &str) -> std::result::Result<JsonValue, TransportError> {
        let url = self.url_for(endpoint);
        let start = std::time::Instant::now();

        let response = self
            .client
            .get(&url)
            .header("Accept", JSON_API_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| TransportError {
                status: e.status().map(|s| s.as_u16()),
                message: format!("Network error: {}", e),
            })?;

        let status = response.status();
        log::debug!("GET {} -> {} in {:?}", url, status, start.elapsed());

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(TransportError::with_status(
                status.as_u16(),
                format!("{} responded {}: {}", url, status, body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::no_response(format!("Failed to parse response: {}", e)))
    }
}
