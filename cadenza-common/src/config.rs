//! Configuration loading and database path resolution
//!
//! Resolution follows the priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file location
pub const CONFIG_ENV_VAR: &str = "CADENZA_CONFIG";

/// Environment variable naming the database file location
pub const DATABASE_ENV_VAR: &str = "CADENZA_DATABASE";

/// Ingest service configuration, loaded from TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IngestConfig {
    /// Path to the SQLite database file
    pub database_path: Option<PathBuf>,

    /// Remote scan policy knobs
    #[serde(default)]
    pub scan: ScanSettings,

    /// Remote catalog HTTP client knobs
    #[serde(default)]
    pub catalog: CatalogSettings,
}

/// Retry/backoff policy for remote page fetches
#[derive(Debug, Clone, Deserialize)]
pub struct ScanSettings {
    /// Maximum fetch attempts per page (transient failures only)
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds, doubled per attempt
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
        }
    }
}

/// HTTP client settings for the remote catalog
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self { timeout_secs: 15 }
    }
}

impl IngestConfig {
    /// Load configuration from an explicit TOML file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Load configuration following the priority order.
    ///
    /// A missing config file is not an error; defaults apply.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }
        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Resolve the database path: CLI arg > env var > TOML > default
    pub fn resolve_database_path(&self, cli_arg: Option<&str>) -> PathBuf {
        if let Some(path) = cli_arg {
            return PathBuf::from(path);
        }
        if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        default_data_dir().join("cadenza.db")
    }
}

/// Default config file path for the platform (`~/.config/cadenza/config.toml`)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cadenza").join("config.toml"))
}

/// Default data directory for the platform
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("cadenza"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.scan.max_attempts, 5);
        assert_eq!(config.scan.initial_backoff_ms, 1_000);
        assert_eq!(config.catalog.timeout_secs, 15);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "database_path = \"/tmp/test.db\"\n\n[scan]\nmax_attempts = 3\ninitial_backoff_ms = 10\nmax_backoff_ms = 100"
        )
        .expect("write config");

        let config = IngestConfig::from_file(file.path()).expect("load config");
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/test.db")));
        assert_eq!(config.scan.max_attempts, 3);
        // Section absent from the file falls back to defaults
        assert_eq!(config.catalog.timeout_secs, 15);
    }

    #[test]
    fn test_cli_arg_overrides_config() {
        let config = IngestConfig {
            database_path: Some(PathBuf::from("/from/config.db")),
            ..Default::default()
        };
        let resolved = config.resolve_database_path(Some("/from/cli.db"));
        assert_eq!(resolved, PathBuf::from("/from/cli.db"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "not valid toml [[[").expect("write config");
        let result = IngestConfig::from_file(file.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
