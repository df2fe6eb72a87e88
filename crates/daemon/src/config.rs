//! Configuration management for the ShareView daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/shareview/config.toml`.
//! Configuration is loaded once at process start and passed into the core
//! services as an immutable value; nothing here is globally mutable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("root_dir must be an absolute path, got {0}")]
    RelativeRoot(String),

    #[error("display_prefix must be empty or start with '/', got {0}")]
    InvalidDisplayPrefix(String),

    #[error("max_request_len must be between 1 and 65536, got {0}")]
    InvalidMaxRequestLen(usize),

    #[error("backend_timeout_secs must be between 1 and 300, got {0}")]
    InvalidBackendTimeout(u64),

    #[error("uid_min ({0}) must be less than uid_max ({1})")]
    InvalidUidRange(u32, u32),

    #[error("auth.backends must not be empty")]
    NoBackends,

    #[error("unknown identity backend: {0}")]
    UnknownBackend(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Identity backend names accepted in `auth.backends`.
const KNOWN_BACKENDS: &[&str] = &["pam", "shadow", "remote-api"];

/// Main configuration structure for the ShareView daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Browse root and path handling.
    pub browse: BrowseConfig,

    /// Authentication backends and account database locations.
    pub auth: AuthConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Browse root and path handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowseConfig {
    /// Root directory every browse is confined to. Must be absolute;
    /// canonicalized once at service construction.
    pub root_dir: PathBuf,

    /// Virtual prefix the web client shows in front of paths, e.g.
    /// "/Web". Stripped from requests only as a whole leading component.
    pub display_prefix: String,

    /// Upper bound on the length of a caller-supplied path, in bytes.
    pub max_request_len: usize,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity backends, consulted in order. The first definitive
    /// answer wins; unavailable backends are skipped.
    pub backends: Vec<String>,

    /// passwd-format account database.
    pub passwd_file: PathBuf,

    /// shadow-format credential store.
    pub shadow_file: PathBuf,

    /// Per-backend call timeout, in seconds.
    pub backend_timeout_secs: u64,

    /// Lowest UID considered an interactive account.
    pub uid_min: u32,

    /// UID ceiling for interactive accounts (exclusive; excludes
    /// `nobody` at 65534).
    pub uid_max: u32,

    /// Usernames always treated as interactive regardless of UID.
    pub extra_users: Vec<String>,

    /// Remote identity API endpoint.
    pub remote_endpoint: String,

    /// PAM service name (used only when the `pam` backend is enabled).
    pub pam_service: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("/share/CACHEDEV1_DATA/Web"),
            display_prefix: "/Web".to_string(),
            max_request_len: 4096,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            backends: vec!["shadow".to_string(), "remote-api".to_string()],
            passwd_file: PathBuf::from("/etc/passwd"),
            shadow_file: PathBuf::from("/etc/shadow"),
            backend_timeout_secs: 10,
            uid_min: 1000,
            uid_max: 65534,
            extra_users: vec!["admin".to_string(), "guest".to_string()],
            remote_endpoint: "http://127.0.0.1:8080/cgi-bin/authLogin.cgi".to_string(),
            pam_service: "shareview".to_string(),
        }
    }
}

impl AuthConfig {
    /// Backend call timeout as a `Duration`.
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shareview")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - SHAREVIEW_ROOT: Override the browse root directory
    /// - SHAREVIEW_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("SHAREVIEW_ROOT") {
            if !root.is_empty() {
                tracing::info!("Overriding root_dir from environment: {}", root);
                self.browse.root_dir = PathBuf::from(root);
            }
        }

        if let Ok(level) = std::env::var("SHAREVIEW_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid
    /// range. Existence of `root_dir` is not checked here; the browse
    /// service canonicalizes it at construction and fails there.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.browse.root_dir.is_absolute() {
            return Err(ConfigError::RelativeRoot(
                self.browse.root_dir.display().to_string(),
            ));
        }

        let prefix = &self.browse.display_prefix;
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(ConfigError::InvalidDisplayPrefix(prefix.clone()));
        }

        if self.browse.max_request_len < 1 || self.browse.max_request_len > 65536 {
            return Err(ConfigError::InvalidMaxRequestLen(
                self.browse.max_request_len,
            ));
        }

        let timeout = self.auth.backend_timeout_secs;
        if !(1..=300).contains(&timeout) {
            return Err(ConfigError::InvalidBackendTimeout(timeout));
        }

        if self.auth.uid_min >= self.auth.uid_max {
            return Err(ConfigError::InvalidUidRange(
                self.auth.uid_min,
                self.auth.uid_max,
            ));
        }

        if self.auth.backends.is_empty() {
            return Err(ConfigError::NoBackends);
        }
        for backend in &self.auth.backends {
            if !KNOWN_BACKENDS.contains(&backend.as_str()) {
                return Err(ConfigError::UnknownBackend(backend.clone()));
            }
        }

        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", e.message()))
    }

    /// Save configuration to a file, creating parent directories if needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(
            config.browse.root_dir,
            PathBuf::from("/share/CACHEDEV1_DATA/Web")
        );
        assert_eq!(config.browse.display_prefix, "/Web");
        assert_eq!(config.auth.backends, vec!["shadow", "remote-api"]);
        assert_eq!(config.auth.backend_timeout_secs, 10);
        assert_eq!(config.auth.uid_min, 1000);
        assert_eq!(config.auth.uid_max, 65534);
        assert!(config.auth.extra_users.contains(&"admin".to_string()));
        assert_eq!(
            config.auth.remote_endpoint,
            "http://127.0.0.1:8080/cgi-bin/authLogin.cgi"
        );
    }

    #[test]
    fn test_validate_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_from_toml_empty_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
[daemon]
log_level = "debug"

[browse]
root_dir = "/srv/share"
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(config.browse.root_dir, PathBuf::from("/srv/share"));
        // Untouched sections keep their defaults
        assert_eq!(config.auth.backend_timeout_secs, 10);
    }

    #[test]
    fn test_from_toml_full_auth_section() {
        let toml = r#"
[auth]
backends = ["remote-api"]
passwd_file = "/custom/passwd"
shadow_file = "/custom/shadow"
backend_timeout_secs = 5
uid_min = 500
uid_max = 60000
extra_users = ["operator"]
remote_endpoint = "http://10.0.0.1:8080/login"
pam_service = "custom"
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.auth.backends, vec!["remote-api"]);
        assert_eq!(config.auth.passwd_file, PathBuf::from("/custom/passwd"));
        assert_eq!(config.auth.backend_timeout(), Duration::from_secs(5));
        assert_eq!(config.auth.extra_users, vec!["operator"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let result = Config::from_toml("[daemon\nlog_level = \"debug\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_relative_root() {
        let mut config = Config::default();
        config.browse.root_dir = PathBuf::from("relative/path");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RelativeRoot(_))
        ));
    }

    #[test]
    fn test_validate_display_prefix() {
        let mut config = Config::default();

        config.browse.display_prefix = String::new();
        assert!(config.validate().is_ok());

        config.browse.display_prefix = "Web".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDisplayPrefix(_))
        ));
    }

    #[test]
    fn test_validate_backend_timeout_bounds() {
        let mut config = Config::default();

        config.auth.backend_timeout_secs = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBackendTimeout(0))
        );

        config.auth.backend_timeout_secs = 301;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBackendTimeout(301))
        );

        config.auth.backend_timeout_secs = 1;
        assert!(config.validate().is_ok());
        config.auth.backend_timeout_secs = 300;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_uid_range() {
        let mut config = Config::default();
        config.auth.uid_min = 65534;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidUidRange(65534, 65534))
        );
    }

    #[test]
    fn test_validate_backends() {
        let mut config = Config::default();

        config.auth.backends = vec![];
        assert_eq!(config.validate(), Err(ConfigError::NoBackends));

        config.auth.backends = vec!["ldap".to_string()];
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownBackend("ldap".to_string()))
        );

        config.auth.backends = vec!["pam".to_string(), "shadow".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = Config::default();

        config.daemon.log_level = "DEBUG".to_string();
        assert!(config.validate().is_ok());

        config.daemon.log_level = "verbose".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("verbose".to_string()))
        );
    }

    #[test]
    fn test_load_missing_file() {
        let config = Config::load("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = Config::default();
        original.daemon.log_level = "debug".to_string();
        original.browse.root_dir = PathBuf::from("/srv/share");
        original.auth.backends = vec!["shadow".to_string()];

        original.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "invalid [ toml").unwrap();

        let result = Config::load(&config_path);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("shareview"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
