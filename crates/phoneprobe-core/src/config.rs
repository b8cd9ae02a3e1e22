//! Configuration management for PhoneProbe.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{EndpointTemplate, IDENTIFIER_PLACEHOLDER};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/phoneprobe/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scanning behavior settings
    pub scanning: ScanningConfig,
    /// Database location
    pub database: DatabaseConfig,
    /// Proxy pool used for the first fetch attempt
    pub proxies: Vec<ProxyConfig>,
    /// Endpoint templates; empty means the built-in set
    pub endpoints: Vec<EndpointTemplate>,
    /// User-Agent pool; empty means the built-in set
    pub user_agents: Vec<String>,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file, falling back to defaults if missing.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from `config_path` (or the default location), apply
    /// environment overrides and validate the result.
    ///
    /// Supports the following environment variables:
    /// - `PHONEPROBE_PROXIES`: Comma-separated `user:pass@host:port` entries (replaces the pool)
    /// - `PHONEPROBE_DATABASE_PATH`: Override database file path
    /// - `PHONEPROBE_PROXY_TIMEOUT_MS`: Override proxied fetch timeout
    /// - `PHONEPROBE_DIRECT_TIMEOUT_MS`: Override direct fetch timeout
    pub fn load_with_env(config_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PHONEPROBE_*` environment variable overrides in place.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(val) = std::env::var("PHONEPROBE_PROXIES") {
            self.proxies = ProxyConfig::parse_list(&val)?;
            tracing::debug!("Override proxies from env: {} entries", self.proxies.len());
        }

        if let Ok(val) = std::env::var("PHONEPROBE_DATABASE_PATH") {
            tracing::debug!("Override database.path from env: {}", val);
            self.database.path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("PHONEPROBE_PROXY_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.scanning.proxy_timeout_ms = ms;
                tracing::debug!("Override scanning.proxy_timeout_ms from env: {}", ms);
            }
        }

        if let Ok(val) = std::env::var("PHONEPROBE_DIRECT_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.scanning.direct_timeout_ms = ms;
                tracing::debug!("Override scanning.direct_timeout_ms from env: {}", ms);
            }
        }

        Ok(())
    }

    /// Check values that would make scanning impossible.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scanning.proxy_timeout_ms == 0 {
            return Err(invalid("scanning.proxy_timeout_ms", "must be greater than zero"));
        }
        if self.scanning.direct_timeout_ms == 0 {
            return Err(invalid("scanning.direct_timeout_ms", "must be greater than zero"));
        }
        if self.scanning.max_bulk_items == 0 {
            return Err(invalid("scanning.max_bulk_items", "must be greater than zero"));
        }
        if let Some(endpoint) = self
            .endpoints
            .iter()
            .find(|e| !e.url_pattern.contains(IDENTIFIER_PLACEHOLDER))
        {
            return Err(invalid(
                "endpoints",
                &format!(
                    "'{}' has no {IDENTIFIER_PLACEHOLDER} placeholder",
                    endpoint.url_pattern
                ),
            ));
        }
        if self.proxies.is_empty() {
            tracing::warn!("No proxies configured, every probe will go direct");
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/phoneprobe/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/phoneprobe`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Resolve the database file, defaulting to `<data_dir>/scans.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("scans.db")),
        }
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "phoneprobe", "phoneprobe").ok_or(ConfigError::NoConfigDir)
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Scanning behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Timeout for the proxied attempt in milliseconds
    pub proxy_timeout_ms: u64,
    /// Timeout for the direct fallback in milliseconds
    pub direct_timeout_ms: u64,
    /// Delay between consecutive bulk items in milliseconds
    pub bulk_delay_ms: u64,
    /// Items past this bound are dropped from a bulk request
    pub max_bulk_items: usize,
    /// Require an `image/*` 200 response from the direct fallback too
    pub verify_direct_content_type: bool,
    /// Number of records returned by a history listing
    pub history_limit: u32,
}

impl ScanningConfig {
    /// Proxied attempt timeout.
    #[must_use]
    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_millis(self.proxy_timeout_ms)
    }

    /// Direct fallback timeout.
    #[must_use]
    pub fn direct_timeout(&self) -> Duration {
        Duration::from_millis(self.direct_timeout_ms)
    }

    /// Delay inserted between bulk items.
    #[must_use]
    pub fn bulk_delay(&self) -> Duration {
        Duration::from_millis(self.bulk_delay_ms)
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            proxy_timeout_ms: 10_000,
            direct_timeout_ms: 5_000,
            bulk_delay_ms: 3_000,
            max_bulk_items: 25,
            verify_direct_content_type: true,
            history_limit: 50,
        }
    }
}

/// Database location settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the `SQLite` file; `None` uses the data directory
    pub path: Option<PathBuf>,
}

/// One authenticated HTTP proxy.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy host name or address
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Basic auth user
    #[serde(default)]
    pub username: String,
    /// Basic auth password
    #[serde(default)]
    pub password: String,
}

impl ProxyConfig {
    /// Proxy URL without credentials, e.g. `http://10.0.0.1:8080`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Whether basic auth credentials are present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    /// Parse a single `user:pass@host:port` or `host:port` entry.
    pub fn parse(entry: &str) -> ConfigResult<Self> {
        let entry = entry.trim();
        let (credentials, address) = match entry.rsplit_once('@') {
            Some((creds, addr)) => (Some(creds), addr),
            None => (None, entry),
        };

        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| invalid("proxies", &format!("'{address}' is missing a port")))?;
        if host.is_empty() {
            return Err(invalid("proxies", &format!("'{address}' is missing a host")));
        }
        let port = port
            .parse()
            .map_err(|_| invalid("proxies", &format!("'{port}' is not a valid port")))?;

        let (username, password) = match credentials {
            Some(creds) => match creds.split_once(':') {
                Some((user, pass)) => (user.to_string(), pass.to_string()),
                None => (creds.to_string(), String::new()),
            },
            None => (String::new(), String::new()),
        };

        Ok(Self {
            host: host.to_string(),
            port,
            username,
            password,
        })
    }

    /// Parse a comma-separated list of proxy entries, skipping blanks.
    pub fn parse_list(list: &str) -> ConfigResult<Vec<Self>> {
        list.split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}
