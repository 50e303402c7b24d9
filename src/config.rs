use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;

use crate::entity::options::{DEFAULT_RELATIONSHIP_GROUP, DEFAULT_RELATIONSHIP_TESTS};
use crate::entity::transform::DEFAULT_FIELD_TESTS;
use crate::lookup::AddressStyle;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub dapi: DapiConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub entity: EntityConfig,
}

/// Resolver-wide configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DapiConfig {
    /// Origin of the CMS, e.g. `https://cms.example.com`. Required for the
    /// http transport.
    #[serde(default)]
    pub base_url: String,
    /// Exhaustive generation: retry missing resources, abort on errors
    #[serde(default)]
    pub strict_generation: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Where payloads come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Http,
    Filesystem,
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Root of pre-generated resource files, for the filesystem transport
    #[serde(default)]
    pub resources_dir: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            timeout_secs: default_timeout_secs(),
            resources_dir: None,
        }
    }
}

/// Address layout and slug normalization
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default)]
    pub style: AddressStyle,
    /// Prepended to every slug, e.g. a language prefix
    #[serde(default)]
    pub alias_prefix: Option<String>,
}

/// Entity projection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    #[serde(default = "default_transform")]
    pub transform: bool,
    #[serde(default = "default_relationship_groups")]
    pub relationship_groups: Vec<String>,
    #[serde(default = "default_relationship_tests")]
    pub relationship_tests: Vec<String>,
    #[serde(default = "default_field_tests")]
    pub field_tests: Vec<String>,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            transform: default_transform(),
            relationship_groups: default_relationship_groups(),
            relationship_tests: default_relationship_tests(),
            field_tests: default_field_tests(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_transform() -> bool {
    true
}

fn default_relationship_groups() -> Vec<String> {
    vec![DEFAULT_RELATIONSHIP_GROUP.to_string()]
}

fn default_relationship_tests() -> Vec<String> {
    DEFAULT_RELATIONSHIP_TESTS.iter().map(|p| p.to_string()).collect()
}

fn default_field_tests() -> Vec<String> {
    DEFAULT_FIELD_TESTS.iter().map(|p| p.to_string()).collect()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in DAPI_CONFIG environment variable
    /// 2. ./dapi.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("DAPI_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("dapi.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.transport.timeout_secs == 0 {
            anyhow::bail!("transport.timeout_secs must be greater than 0");
        }

        match self.transport.kind {
            TransportKind::Http => {
                if self.dapi.base_url.trim().is_empty() {
                    anyhow::bail!("dapi.base_url is required for the http transport");
                }
                url::Url::parse(&self.dapi.base_url)
                    .with_context(|| format!("dapi.base_url is not a valid URL: {}", self.dapi.base_url))?;
            }
            TransportKind::Filesystem => {
                let dir = self.transport.resources_dir.as_ref().with_context(|| {
                    "transport.resources_dir is required for the filesystem transport".to_string()
                })?;
                if !dir.is_dir() {
                    anyhow::bail!(
                        "transport.resources_dir must be an existing directory: {}",
                        dir.display()
                    );
                }
            }
        }

        if self.entity.relationship_groups.is_empty() {
            anyhow::bail!("entity.relationship_groups must name at least one group");
        }

        for pattern in self
            .entity
            .relationship_tests
            .iter()
            .chain(&self.entity.field_tests)
        {
            Regex::new(pattern)
                .with_context(|| format!("Invalid pattern in [entity]: {}", pattern))?;
        }

        Ok(())
    }

    pub fn log_level(&self) -> &str {
        &self.dapi.log_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide cwd and env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const MINIMAL: &str = r#"
[dapi]
base_url = "https://cms.example.com"
"#;

    fn create_test_config(resources_dir: &std::path::Path) -> String {
        let dir = resources_dir.to_str().unwrap().replace('\\', "\\\\");
        format!(
            r#"
[dapi]
strict_generation = true
log_level = "debug"

[transport]
kind = "filesystem"
timeout_secs = 5
resources_dir = "{}"

[endpoints]
style = "static"
alias_prefix = "/en"

[entity]
relationship_tests = ["^field_"]
"#,
            dir
        )
    }

    /// Restores cwd when dropped (e.g. on panic).
    struct CwdGuard(std::path::PathBuf);
    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn with_config_env(config_path: Option<&std::path::Path>, f: impl FnOnce()) {
        let original_config = std::env::var("DAPI_CONFIG").ok();
        match config_path {
            Some(path) => std::env::set_var("DAPI_CONFIG", path.to_str().unwrap()),
            None => std::env::remove_var("DAPI_CONFIG"),
        }
        f();
        std::env::remove_var("DAPI_CONFIG");
        if let Some(val) = original_config {
            std::env::set_var("DAPI_CONFIG", val);
        }
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.transport.kind, TransportKind::Http);
        assert_eq!(config.transport.timeout_secs, 30);
        assert_eq!(config.endpoints.style, AddressStyle::Api);
        assert!(config.endpoints.alias_prefix.is_none());
        assert!(!config.dapi.strict_generation);
        assert_eq!(config.log_level(), "info");
        assert!(config.entity.transform);
        assert_eq!(config.entity.relationship_groups, vec!["relationships"]);
        assert_eq!(config.entity.field_tests.len(), DEFAULT_FIELD_TESTS.len());
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let resources = temp_dir.path().join("dist");
        fs::create_dir(&resources).unwrap();
        let config_path = temp_dir.path().join("dapi.toml");
        fs::write(&config_path, create_test_config(&resources)).unwrap();

        with_config_env(Some(&config_path), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.log_level(), "debug");
            assert!(config.dapi.strict_generation);
            assert_eq!(config.transport.kind, TransportKind::Filesystem);
            assert_eq!(config.transport.timeout_secs, 5);
            assert_eq!(config.endpoints.style, AddressStyle::Static);
            assert_eq!(config.endpoints.alias_prefix.as_deref(), Some("/en"));
            assert_eq!(config.entity.relationship_tests, vec!["^field_"]);
        });
    }

    #[test]
    fn test_config_loads_path_from_env_file() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("site.toml");
        fs::write(&config_path, MINIMAL).unwrap();
        let config_path = config_path.canonicalize().unwrap();
        fs::write(
            temp_dir.path().join(".env"),
            format!("DAPI_CONFIG={}\n", config_path.display()),
        )
        .unwrap();

        let original_dir = std::env::current_dir().unwrap();
        let _cwd = CwdGuard(original_dir);
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(None, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config should load from DAPI_CONFIG in .env");
            assert_eq!(config.unwrap().dapi.base_url, "https://cms.example.com");
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        with_config_env(Some(&temp_dir.path().join("nonexistent.toml")), || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("Failed to read config file"));
        });
    }

    #[test]
    fn test_http_requires_valid_base_url() {
        let missing = Config::from_toml_str("[dapi]\n");
        assert!(missing.unwrap_err().to_string().contains("base_url"));

        let invalid = Config::from_toml_str("[dapi]\nbase_url = \"not a url\"\n");
        assert!(invalid.is_err());
    }

    #[test]
    fn test_filesystem_requires_existing_dir() {
        let config = Config::from_toml_str(
            r#"
[dapi]
[transport]
kind = "filesystem"
resources_dir = "/definitely/not/here"
"#,
        );
        assert!(config
            .unwrap_err()
            .to_string()
            .contains("must be an existing directory"));

        let config = Config::from_toml_str("[dapi]\n[transport]\nkind = \"filesystem\"\n");
        assert!(config.unwrap_err().to_string().contains("resources_dir"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config::from_toml_str(&format!("{}\n[transport]\ntimeout_secs = 0\n", MINIMAL));
        assert!(config.unwrap_err().to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        let config = Config::from_toml_str(&format!("{}\n[entity]\nfield_tests = [\"(\"]\n", MINIMAL));
        assert!(config.unwrap_err().to_string().contains("Invalid pattern"));

        let config = Config::from_toml_str(&format!(
            "{}\n[entity]\nrelationship_groups = []\n",
            MINIMAL
        ));
        assert!(config.unwrap_err().to_string().contains("relationship_groups"));
    }
}
