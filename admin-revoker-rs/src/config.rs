// admin-revoker-rs/src/config.rs
//
// Configuration for the revoker. One file, read once at startup; the format
// follows the file extension.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable that overrides `revoker.db.url`
pub const DB_URL_ENV: &str = "ADMIN_REVOKER_DB_URL";

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub revoker: RevokerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the revoker itself
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevokerConfig {
    /// Certificate database
    pub db: DbConfig,

    /// Transport used to reach both authorities
    #[serde(default)]
    pub transport: Transport,

    /// Client TLS for the authorities
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Registration authority endpoint
    pub ra_service: ServiceConfig,

    /// Storage authority endpoint
    pub sa_service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbConfig {
    /// Connection URL; `memory:` selects the in-memory store
    #[serde(default)]
    pub url: Option<String>,

    /// File holding the connection URL, used when `url` is absent
    #[serde(default)]
    pub url_file: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Bound on each begin, query, commit and rollback
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Defer the first connection until a transaction is opened
    #[serde(default)]
    pub lazy_connect: bool,
}

impl DbConfig {
    /// The resolved connection URL
    pub fn database_url(&self) -> Result<String, ConfigError> {
        self.url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::ValidationError("revoker.db.url is not set".to_string()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Fill `url` from `url_file` when only the file is configured
    async fn resolve_url_file(&mut self) -> Result<(), ConfigError> {
        if self.url.is_some() {
            return Ok(());
        }
        if let Some(path) = &self.url_file {
            let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
                ConfigError::AccessError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            self.url = Some(contents.trim().to_string());
        }
        Ok(())
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            url_file: None,
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            lazy_connect: false,
        }
    }
}

/// How the authorities are reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Current transport
    #[default]
    Grpc,
    /// Legacy JSON-over-HTTP transport
    Http,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Grpc => write!(f, "grpc"),
            Transport::Http => write!(f, "http"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TlsConfig {
    #[serde(default)]
    pub ca_cert_file: Option<PathBuf>,
    #[serde(default)]
    pub cert_file: Option<PathBuf>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// Name to verify on the server certificate, when it differs from the address host
    #[serde(default)]
    pub server_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    /// Base URL, e.g. `https://ra.internal:9094`
    pub address: String,

    /// Per-call deadline in milliseconds
    #[serde(default = "default_service_timeout_ms")]
    pub timeout_ms: u64,
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,

    /// Directory for daily-rotated log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            log_dir: None,
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_query_timeout_ms() -> u64 {
    10_000
}

fn default_service_timeout_ms() -> u64 {
    15_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported configuration format: {}",
                path.display()
            ))),
        }
    }
}

impl Config {
    /// Load, resolve and validate a configuration file
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::parse(&content, ConfigFormat::from_path(path)?)?;
        config.apply_overrides(std::env::var(DB_URL_ENV).ok());
        config.revoker.db.resolve_url_file().await?;
        config.validate()?;

        debug!(path = %path.display(), transport = %config.revoker.transport, "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration text in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e))),
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("YAML parse error: {}", e))),
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e))),
        }
    }

    /// Apply environment overrides
    pub fn apply_overrides(&mut self, db_url: Option<String>) {
        if let Some(url) = db_url.filter(|url| !url.is_empty()) {
            self.revoker.db.url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let revoker = &self.revoker;

        if revoker.db.url.is_none() && revoker.db.url_file.is_none() {
            return Err(ConfigError::ValidationError(
                "revoker.db.url or revoker.db.url_file must be set".to_string(),
            ));
        }
        if revoker.db.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "revoker.db.max_connections must be greater than 0".to_string(),
            ));
        }
        if revoker.db.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "revoker.db.connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if revoker.db.query_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "revoker.db.query_timeout_ms must be greater than 0".to_string(),
            ));
        }

        for (name, service) in [("ra_service", &revoker.ra_service), ("sa_service", &revoker.sa_service)] {
            if !(service.address.starts_with("http://") || service.address.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "revoker.{}.address must be an http:// or https:// URL, got {:?}",
                    name, service.address
                )));
            }
            if service.timeout_ms == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "revoker.{}.timeout_ms must be greater than 0",
                    name
                )));
            }
        }

        if let Some(tls) = &revoker.tls {
            if tls.cert_file.is_some() != tls.key_file.is_some() {
                return Err(ConfigError::ValidationError(
                    "revoker.tls.cert_file and revoker.tls.key_file must be set together".to_string(),
                ));
            }
        }

        Ok(())
    }
}
