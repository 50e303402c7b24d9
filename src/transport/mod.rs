//! Transport adapters: how a raw payload is fetched for an address.

pub mod filesystem;
pub mod http;
pub mod memory;

pub use filesystem::FileTransport;
pub use http::HttpTransport;
pub use memory::MemoryTransport;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{Config, TransportKind};
use crate::error::{DapiError, Result};

/// A failed fetch. `status` is `None` when no response was received or the
/// body could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failure (status {status:?}): {message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn no_response(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

/// Fetches the raw JSON payload stored at an endpoint. Must be idempotent.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, endpoint: &str) -> std::result::Result<JsonValue, TransportError>;
}

/// Build the transport selected in configuration.
pub fn from_config(config: &Config) -> Result<Arc<dyn Transport>> {
    match config.transport.kind {
        TransportKind::Http => Ok(Arc::new(HttpTransport::new(
            &config.dapi.base_url,
            Duration::from_secs(config.transport.timeout_secs),
        )?)),
        TransportKind::Filesystem => {
            let root = config.transport.resources_dir.clone().ok_or_else(|| {
                DapiError::Config("transport.resources_dir is required for filesystem".to_string())
            })?;
            Ok(Arc::new(FileTransport::new(root)))
        }
    }
}
