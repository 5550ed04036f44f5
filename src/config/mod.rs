//! Configuration management.
//!
//! Settings come from three layers, later ones winning:
//! built-in defaults, a TOML file, and `DISCOVERY_*` environment variables.
//!
//! ```toml
//! [storage]
//! backend = "sqlite"          # or "postgres"
//! path = "/var/lib/discovery/discovery.db"
//! url = "postgresql://indexer@localhost/discovery"
//! pool_max_size = 20
//!
//! [lookup]
//! default_limit = 100
//! max_limit = 1000
//!
//! [logging]
//! format = "json"             # or "pretty"
//! filter = "discovery_index=debug"
//! file = "/var/log/discovery.log"
//!
//! [metrics]
//! enabled = true
//! port = 9090
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Directory name used under the platform config and data dirs.
const APP_DIR: &str = "discovery-index";

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryConfig {
    /// Link store selection.
    pub storage: StorageConfig,
    /// Search paging limits.
    pub lookup: LookupConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// Metrics exporter.
    pub metrics: MetricsConfig,
}

/// Available link store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendType {
    /// `SQLite` file or in-memory database.
    #[default]
    Sqlite,
    /// PostgreSQL server (requires the `postgres` feature).
    Postgres,
}

impl StorageBackendType {
    /// Parses a backend name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(Error::InvalidInput(format!(
                "unknown storage backend '{other}' (expected sqlite or postgres)"
            ))),
        }
    }
}

/// Link store settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageConfig {
    /// Backend to open.
    pub backend: StorageBackendType,
    /// `SQLite` database path; the platform data dir is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// PostgreSQL connection URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Maximum PostgreSQL pool size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_max_size: Option<usize>,
}

impl StorageConfig {
    /// Resolves the `SQLite` database path.
    ///
    /// Falls back to `<data dir>/discovery-index/discovery.db`, or to
    /// `./discovery.db` when no home directory is known.
    #[must_use]
    pub fn sqlite_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        directories::BaseDirs::new().map_or_else(
            || PathBuf::from("discovery.db"),
            |dirs| dirs.data_dir().join(APP_DIR).join("discovery.db"),
        )
    }
}

/// Search paging limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LookupConfig {
    /// Page size used when a search gives no positive limit.
    pub default_limit: usize,
    /// Upper bound requested limits are clamped to.
    pub max_limit: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 1000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-line.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidInput(format!(
                "unknown log format '{other}' (expected pretty or json)"
            ))),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directives; `DISCOVERY_LOG` and `RUST_LOG` take precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Append logs to this file instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsConfig {
    /// Whether to serve `/metrics`.
    pub enabled: bool,
    /// Listen port.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// `[storage]` section.
    pub storage: Option<ConfigFileStorage>,
    /// `[lookup]` section.
    pub lookup: Option<ConfigFileLookup>,
    /// `[logging]` section.
    pub logging: Option<ConfigFileLogging>,
    /// `[metrics]` section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Storage section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStorage {
    /// Backend name.
    pub backend: Option<String>,
    /// `SQLite` path.
    pub path: Option<String>,
    /// PostgreSQL URL.
    pub url: Option<String>,
    /// Pool size.
    pub pool_max_size: Option<usize>,
}

/// Lookup section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLookup {
    /// Default page size.
    pub default_limit: Option<usize>,
    /// Maximum page size.
    pub max_limit: Option<usize>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Format name.
    pub format: Option<String>,
    /// Filter directives.
    pub filter: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMetrics {
    /// Exporter toggle.
    pub enabled: Option<bool>,
    /// Exporter port.
    pub port: Option<u16>,
}

fn config_error(operation: &str, e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{key}='{raw}' is not a valid value")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{key}='{raw}' is not a boolean"
        ))),
    }
}

impl DiscoveryConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidInput(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the text is not valid TOML or a
    /// value is invalid.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::InvalidInput(format!("invalid config file: {e}")))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `<platform config dir>/discovery-index/config.toml`, then
    /// `~/.config/discovery-index/config.toml`. Returns defaults when no
    /// readable file is found, together with one message per file that
    /// existed but was skipped. Logging is usually not set up yet when this
    /// runs, so the caller reports the messages.
    #[must_use]
    pub fn load_default() -> (Self, Vec<String>) {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return (Self::default(), Vec::new());
        };

        let candidates = [
            base_dirs.config_dir().join(APP_DIR).join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join(APP_DIR)
                .join("config.toml"),
        ];
        Self::load_first(&candidates)
    }

    /// Loads the first existing candidate that parses.
    fn load_first(candidates: &[PathBuf]) -> (Self, Vec<String>) {
        let mut skipped = Vec::new();
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return (config, skipped),
                Err(e) => skipped.push(format!("Ignoring config file {}: {e}", path.display())),
            }
        }
        (Self::default(), skipped)
    }

    /// Converts a `ConfigFile` to `DiscoveryConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(storage) = file.storage {
            if let Some(backend) = storage.backend {
                config.storage.backend = StorageBackendType::parse(&backend)?;
            }
            config.storage.path = storage.path.map(PathBuf::from);
            config.storage.url = storage.url;
            config.storage.pool_max_size = storage.pool_max_size;
        }
        if let Some(lookup) = file.lookup {
            if let Some(v) = lookup.default_limit {
                config.lookup.default_limit = v;
            }
            if let Some(v) = lookup.max_limit {
                config.lookup.max_limit = v;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format)?;
            }
            config.logging.filter = logging.filter;
            config.logging.file = logging.file.map(PathBuf::from);
        }
        if let Some(metrics) = file.metrics {
            if let Some(v) = metrics.enabled {
                config.metrics.enabled = v;
            }
            if let Some(v) = metrics.port {
                config.metrics.port = v;
            }
        }

        Ok(config)
    }

    /// Applies `DISCOVERY_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable holds an invalid value.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable holds an invalid value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("DISCOVERY_STORAGE_BACKEND") {
            self.storage.backend = StorageBackendType::parse(&v)?;
        }
        if let Some(v) = lookup("DISCOVERY_DB_PATH") {
            self.storage.path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("DISCOVERY_DATABASE_URL") {
            self.storage.url = Some(v);
        }
        if let Some(v) = lookup("DISCOVERY_DEFAULT_LIMIT") {
            self.lookup.default_limit = parse_env("DISCOVERY_DEFAULT_LIMIT", &v)?;
        }
        if let Some(v) = lookup("DISCOVERY_MAX_LIMIT") {
            self.lookup.max_limit = parse_env("DISCOVERY_MAX_LIMIT", &v)?;
        }
        if let Some(v) = lookup("DISCOVERY_LOG_FORMAT") {
            self.logging.format = LogFormat::parse(&v)?;
        }
        if let Some(v) = lookup("DISCOVERY_METRICS_ENABLED") {
            self.metrics.enabled = parse_bool("DISCOVERY_METRICS_ENABLED", &v)?;
        }
        if let Some(v) = lookup("DISCOVERY_METRICS_PORT") {
            self.metrics.port = parse_env("DISCOVERY_METRICS_PORT", &v)?;
        }
        Ok(())
    }

    /// Checks cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the limits are inconsistent or the
    /// PostgreSQL backend is selected without a URL.
    pub fn validate(&self) -> Result<()> {
        if self.lookup.default_limit == 0 {
            return Err(Error::InvalidInput(
                "lookup.default_limit must be at least 1".to_string(),
            ));
        }
        if self.lookup.max_limit < self.lookup.default_limit {
            return Err(Error::InvalidInput(format!(
                "lookup.max_limit ({}) must not be below lookup.default_limit ({})",
                self.lookup.max_limit, self.lookup.default_limit
            )));
        }
        if self.storage.backend == StorageBackendType::Postgres && self.storage.url.is_none() {
            return Err(Error::InvalidInput(
                "storage.url is required for the postgres backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Renders the effective configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| config_error("render_config", e))
    }

    /// Sets the `SQLite` database path.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.storage.backend, StorageBackendType::Sqlite);
        assert_eq!(config.lookup.default_limit, 100);
        assert_eq!(config.lookup.max_limit, 1000);
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = DiscoveryConfig::from_toml_str(
            r#"
            [storage]
            backend = "postgres"
            url = "postgresql://localhost/discovery"
            pool_max_size = 8

            [lookup]
            default_limit = 25

            [logging]
            format = "json"
            file = "/tmp/discovery.log"

            [metrics]
            enabled = true
            port = 9100
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackendType::Postgres);
        assert_eq!(config.storage.pool_max_size, Some(8));
        assert_eq!(config.lookup.default_limit, 25);
        assert_eq!(config.lookup.max_limit, 1000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/discovery.log")));
        assert_eq!(config.metrics.port, 9100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = DiscoveryConfig::from_toml_str("[storage]\nbackend = \"mongo\"\n");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DISCOVERY_DB_PATH", "/data/links.db"),
            ("DISCOVERY_MAX_LIMIT", "50"),
            ("DISCOVERY_METRICS_ENABLED", "yes"),
            ("DISCOVERY_LOG_FORMAT", "JSON"),
        ]);
        let mut config = DiscoveryConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.storage.sqlite_path(), PathBuf::from("/data/links.db"));
        assert_eq!(config.lookup.max_limit, 50);
        assert!(config.metrics.enabled);
        assert_eq!(config.logging.format, LogFormat::Json);
        // default_limit 100 is now above max_limit 50
        assert!(config.validate().is_err());
    }

    #[test_case("DISCOVERY_DEFAULT_LIMIT", "many" ; "non-numeric limit")]
    #[test_case("DISCOVERY_METRICS_PORT", "70000" ; "port out of range")]
    #[test_case("DISCOVERY_METRICS_ENABLED", "maybe" ; "non-boolean toggle")]
    #[test_case("DISCOVERY_STORAGE_BACKEND", "oracle" ; "unknown backend")]
    fn test_env_override_rejects(key: &str, value: &str) {
        let mut config = DiscoveryConfig::default();
        let result = config.apply_overrides(|k| (k == key).then(|| value.to_string()));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_postgres_requires_url() {
        let mut config = DiscoveryConfig::default();
        config.storage.backend = StorageBackendType::Postgres;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_toml_renders_sections() {
        let rendered = DiscoveryConfig::default()
            .with_db_path("/tmp/x.db")
            .to_toml()
            .unwrap();
        assert!(rendered.contains("[storage]"));
        assert!(rendered.contains("backend = \"sqlite\""));
        assert!(rendered.contains("[lookup]"));
        assert!(rendered.contains("default_limit = 100"));
    }

    #[test]
    fn test_malformed_file_is_invalid_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage\nbackend = ").unwrap();

        let err = DiscoveryConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);

        let missing =
            DiscoveryConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(missing.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn test_load_first_reports_skipped_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("good.toml");
        std::fs::write(&broken, "not = [toml").unwrap();
        std::fs::write(&good, "[lookup]\ndefault_limit = 7\n").unwrap();

        let (config, skipped) = DiscoveryConfig::load_first(&[
            dir.path().join("absent.toml"),
            broken.clone(),
            good,
        ]);
        assert_eq!(config.lookup.default_limit, 7);
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].contains(&broken.display().to_string()));
    }

    #[test]
    fn test_load_first_without_files_is_default() {
        let (config, skipped) = DiscoveryConfig::load_first(&[]);
        assert_eq!(config.lookup.default_limit, 100);
        assert!(skipped.is_empty());
    }
}
