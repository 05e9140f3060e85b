use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable consulted for the API key when `auth.api_key_env` is not set.
pub const DEFAULT_API_KEY_ENV: &str = "DOCSHELF_API_KEY";

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_saphyr::from_str(&contents)?)
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Upper bound on a multipart request body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    300
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

// ============================================================================
// StorageConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Base directory for uploaded files.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default)]
    pub records: RecordsConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            records: RecordsConfig::default(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordBackend {
    #[default]
    Sqlite,
    File,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct RecordsConfig {
    #[serde(default)]
    pub backend: RecordBackend,
    /// Database file for `sqlite`, directory for `file`; ignored for `memory`.
    #[serde(default = "default_records_path")]
    pub path: PathBuf,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            backend: RecordBackend::default(),
            path: default_records_path(),
        }
    }
}

fn default_records_path() -> PathBuf {
    PathBuf::from("./data/docshelf.db")
}

// ============================================================================
// AuthConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Shared secret expected in the `X-API-KEY` header.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable that overrides `api_key` when set.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl AuthConfig {
    /// The effective API key: environment first, then the config file.
    ///
    /// Empty values count as unset.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone().filter(|key| !key.is_empty()))
            .ok_or_else(|| ConfigError::MissingApiKey {
                env: self.api_key_env.clone(),
            })
    }
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

// ============================================================================
// ReportConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_enabled")]
    pub enabled: bool,
    /// Cron expression with a seconds field (`sec min hour dom mon dow`),
    /// evaluated in the server's local time zone.
    #[serde(default = "default_report_schedule")]
    pub schedule: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: default_report_enabled(),
            schedule: default_report_schedule(),
        }
    }
}

fn default_report_enabled() -> bool {
    true
}

fn default_report_schedule() -> String {
    "0 30 20 * * *".to_string()
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("invalid report schedule '{expr}': {message}")]
    Schedule { expr: String, message: String },

    #[error("no API key configured: set auth.api_key or the {env} environment variable")]
    MissingApiKey { env: String },
}

// ============================================================================
// Tests
// ============================================================================
