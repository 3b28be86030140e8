//! Configuration system for Warden
//!
//! All sections are optional in the TOML file; anything left out falls back to
//! the defaults below.
//!
//! ```toml
//! [database]
//! path = "data/warden.db"
//!
//! [rules]
//! cache_ttl_secs = 30
//!
//! [verification]
//! default_ttl_secs = 600
//!
//! [infractions.weights]
//! spam = 1
//! slur = 5
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_db::DbOptions;

use crate::error::{ConfigError, PolicyError, PolicyResult};
use crate::retry::RetryConfig;

/// Environment variable overriding `database.path`.
pub const DB_PATH_ENV: &str = "WARDEN_DB_PATH";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub retry: RetryConfig,
    pub rules: RulesConfig,
    pub verification: VerificationConfig,
    pub infractions: InfractionConfig,
}

/// Database configuration for SQLite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("warden")
                .join("warden.db"),
        }
    }
}

/// Connection pool and deadline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    pub busy_timeout_ms: u64,
    /// Upper bound on any single store operation
    pub operation_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let defaults = DbOptions::default();
        Self {
            max_connections: defaults.max_connections,
            acquire_timeout_ms: defaults.acquire_timeout.as_millis() as u64,
            busy_timeout_ms: defaults.busy_timeout.as_millis() as u64,
            operation_timeout_ms: defaults.operation_timeout.as_millis() as u64,
        }
    }
}

impl StoreConfig {
    pub fn to_db_options(&self) -> DbOptions {
        DbOptions {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
        }
    }
}

/// Rule snapshot caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Maximum age of the cached rule snapshot. Zero disables caching.
    pub cache_ttl_secs: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self { cache_ttl_secs: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// TTL used when a caller does not pick one
    pub default_ttl_secs: u64,
    /// Token generation attempts before giving up on collisions
    pub max_generation_attempts: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 600,
            max_generation_attempts: 3,
        }
    }
}

/// Points added per infraction kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfractionConfig {
    /// Points for kinds not listed in `weights`
    pub default_points: u32,
    pub weights: HashMap<String, u32>,
}

impl Default for InfractionConfig {
    fn default() -> Self {
        Self {
            default_points: 1,
            weights: HashMap::new(),
        }
    }
}

impl InfractionConfig {
    pub fn points_for(&self, kind: &str) -> u32 {
        self.weights
            .get(kind)
            .copied()
            .unwrap_or(self.default_points)
    }
}

impl WardenConfig {
    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.verification.max_generation_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "verification.max_generation_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.store.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.max_connections".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.store.operation_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.operation_timeout_ms".to_string(),
                reason: "must be non-zero so store calls cannot hang".to_string(),
            });
        }
        if self.infractions.default_points == 0 {
            return Err(ConfigError::InvalidValue {
                field: "infractions.default_points".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(kind) = self
            .infractions
            .weights
            .iter()
            .find_map(|(kind, points)| (*points == 0).then_some(kind))
        {
            return Err(ConfigError::InvalidValue {
                field: format!("infractions.weights.{kind}"),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            if !path.trim().is_empty() {
                self.database.path = PathBuf::from(path);
            }
        }
    }

    pub fn rule_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.rules.cache_ttl_secs)
    }
}

/// Resolve a path relative to a base directory
/// If the path is absolute, return it as-is
/// If the path is relative, resolve it relative to the base directory
fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn configuration_error(
    path: &Path,
    field: &str,
    expected: &str,
    cause: ConfigError,
) -> PolicyError {
    PolicyError::ConfigurationError {
        config_path: path.display().to_string(),
        field: field.to_string(),
        expected: expected.to_string(),
        cause,
    }
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<WardenConfig, ConfigError> {
    let config: WardenConfig =
        toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a TOML file
///
/// A relative `database.path` is resolved against the config file's directory.
pub async fn load_config(path: &Path) -> PolicyResult<WardenConfig> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        configuration_error(path, "file", "readable TOML file", ConfigError::Io(e.to_string()))
    })?;

    let mut config = parse_config(&content).map_err(|cause| {
        configuration_error(path, "content", "valid Warden configuration", cause)
    })?;

    let base_dir = path.parent().unwrap_or(Path::new("."));
    config.database.path = resolve_path(base_dir, &config.database.path);
    config.apply_env();

    Ok(config)
}

/// Save configuration to a TOML file
pub async fn save_config(config: &WardenConfig, path: &Path) -> PolicyResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            configuration_error(
                parent,
                "directory",
                "writable directory",
                ConfigError::Io(e.to_string()),
            )
        })?;
    }

    let content = toml::to_string_pretty(config).map_err(|e| {
        configuration_error(
            path,
            "serialization",
            "serializable config structure",
            ConfigError::TomlSerialize(e.to_string()),
        )
    })?;

    tokio::fs::write(path, content).await.map_err(|e| {
        configuration_error(
            path,
            "file",
            "writable file location",
            ConfigError::Io(e.to_string()),
        )
    })?;

    Ok(())
}

/// Standard config file locations
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // Project-specific config
    paths.push(PathBuf::from("warden.toml"));

    // User config directory
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("warden").join("config.toml"));
    }

    // Home directory fallback
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".warden").join("config.toml"));
    }

    paths
}

/// Load configuration from standard locations
pub async fn load_config_from_standard_locations() -> PolicyResult<WardenConfig> {
    for path in config_paths() {
        if path.exists() {
            tracing::debug!("Using config file {}", path.display());
            return load_config(&path).await;
        }
    }

    // No config found, use defaults
    let mut config = WardenConfig::default();
    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_is_default() {
        let config = parse_config("").unwrap();
        assert_eq!(config.verification.default_ttl_secs, 600);
        assert_eq!(config.verification.max_generation_attempts, 3);
        assert_eq!(config.rules.cache_ttl_secs, 30);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.infractions.points_for("anything"), 1);
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_config(
            r#"
            [database]
            path = "/var/lib/warden/warden.db"

            [store]
            operation_timeout_ms = 1500

            [infractions]
            default_points = 2

            [infractions.weights]
            slur = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/var/lib/warden/warden.db"));
        assert_eq!(config.store.operation_timeout_ms, 1500);
        assert_eq!(config.store.max_connections, 5);
        assert_eq!(config.infractions.points_for("slur"), 5);
        assert_eq!(config.infractions.points_for("spam"), 2);
        assert_eq!(
            config.store.to_db_options().operation_timeout,
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let err = parse_config("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "retry.max_attempts"
        ));
    }

    #[test]
    fn test_rejects_zero_points() {
        let err = parse_config("[infractions]\ndefault_points = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "infractions.default_points"
        ));

        let err = parse_config("[infractions.weights]\nspam = 2\nnoise = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "infractions.weights.noise"
        ));
    }

    #[test]
    fn test_rejects_bad_toml() {
        assert!(matches!(
            parse_config("[rules\ncache_ttl_secs = 1"),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[tokio::test]
    async fn test_load_resolves_relative_db_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        tokio::fs::write(&path, "[database]\npath = \"data/warden.db\"\n")
            .await
            .unwrap();

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.database.path, dir.path().join("data/warden.db"));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("warden.toml");

        let mut config = WardenConfig::default();
        config.database.path = dir.path().join("w.db");
        config.infractions.weights.insert("raid".to_string(), 10);
        save_config(&config, &path).await.unwrap();

        let loaded = load_config(&path).await.unwrap();
        assert_eq!(loaded.database.path, config.database.path);
        assert_eq!(loaded.infractions.points_for("raid"), 10);
    }

    #[tokio::test]
    async fn test_missing_file_is_configuration_error() {
        let err = load_config(Path::new("/definitely/not/here.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::ConfigurationError { .. }));
    }
}
