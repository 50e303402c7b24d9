//! Resource store backed by pre-generated JSON files.
//!
//! Endpoints map onto paths below a root directory: the query string is
//! dropped and `.json` appended when missing, so `/about?_format=json` reads
//! `<root>/about.json` and `/_resources/node/page/u1.json` reads itself.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::path::{Component, Path, PathBuf};

use super::{Transport, TransportError};

pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// File backing an endpoint, or `None` if the endpoint escapes the root.
    pub fn path_for(&self, endpoint: &str) -> Option<PathBuf> {
        let path = endpoint.split('?').next().unwrap_or_default();
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        let mut file = self.root.join(relative);
        if file.extension().map_or(true, |ext| ext != "json") {
            let mut name = file.file_name()?.to_os_string();
            name.push(".json");
            file.set_file_name(name);
        }
        Some(file)
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn get(&self, endpoint: &str) -> std::result::Result<JsonValue, TransportError> {
        let path = self.path_for(endpoint).ok_or_else(|| {
            TransportError::with_status(404, format!("No resource file for {}", endpoint))
        })?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransportError::with_status(
                    404,
                    format!("Resource file not found: {}", path.display()),
                ));
            }
            Err(e) => {
                return Err(TransportError::no_response(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            TransportError::no_response(format!("JSON parse error in {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_path_for_endpoints() {
        let transport = FileTransport::new("/srv/dist");
        assert_eq!(
            transport.path_for("/about?_format=json"),
            Some(PathBuf::from("/srv/dist/about.json"))
        );
        assert_eq!(
            transport.path_for("/_resources/node/page/u1.json"),
            Some(PathBuf::from("/srv/dist/_resources/node/page/u1.json"))
        );
        assert_eq!(transport.path_for("/../etc/passwd"), None);
    }

    #[tokio::test]
    async fn test_reads_resource_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("_resources/node/page");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("u1.json"),
            r#"{"data": {"type": "node--page", "id": "u1", "attributes": {}}}"#,
        )
        .unwrap();

        let transport = FileTransport::new(temp_dir.path());
        let payload = transport.get("/_resources/node/page/u1.json").await.unwrap();
        assert_eq!(payload["data"]["id"], "u1");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let transport = FileTransport::new(temp_dir.path());
        let err = transport.get("/missing?_format=json").await.unwrap_err();
        assert_eq!(err.status, Some(404));
    }

    #[tokio::test]
    async fn test_malformed_file_has_no_status() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();
        let transport = FileTransport::new(temp_dir.path());
        let err = transport.get("/broken").await.unwrap_err();
        assert_eq!(err.status, None);
    }
}
