//! Application configuration module
//!
//! Provides the configuration types for the client: where the API lives,
//! how long requests may take, and the timing of session validation.
//!
//! Values come from three places, later ones overriding earlier ones:
//! built-in defaults, an optional TOML file, and `GAVEL_*` environment
//! variables.
//!
//! ```toml
//! server_url = "https://auctions.example.com/api/"
//! request_timeout_secs = 20
//! revalidate_interval_secs = 300
//!
//! [endpoints]
//! orders = ["auction/order/user?page={page}"]
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default API base URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080/api/";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_VALIDATION_ATTEMPTS: u32 = 3;
const DEFAULT_VALIDATION_BACKOFF_UNIT: Duration = Duration::from_secs(1);
const DEFAULT_REVALIDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// API base URL, always ending in `/`
    pub server_url: String,
    /// Upper bound on a single HTTP request
    pub request_timeout: Duration,
    /// Startup validation attempts before keeping the session provisionally
    pub validation_attempts: u32,
    /// Attempt `n` of startup validation waits `n` times this unit
    pub validation_backoff_unit: Duration,
    /// Period of the background token check
    pub revalidate_interval: Duration,
    /// Credential file location; `None` selects the platform data dir
    pub store_path: Option<PathBuf>,
    /// Endpoint path overrides keyed by endpoint name
    pub endpoints: BTreeMap<String, Vec<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            validation_attempts: DEFAULT_VALIDATION_ATTEMPTS,
            validation_backoff_unit: DEFAULT_VALIDATION_BACKOFF_UNIT,
            revalidate_interval: DEFAULT_REVALIDATE_INTERVAL,
            store_path: None,
            endpoints: BTreeMap::new(),
        }
    }
}

/// On-disk shape of the configuration file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    validation_attempts: Option<u32>,
    validation_backoff_ms: Option<u64>,
    revalidate_interval_secs: Option<u64>,
    store_path: Option<PathBuf>,
    #[serde(default)]
    endpoints: BTreeMap<String, Vec<String>>,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::builder().merge_file(file).build()
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Settings from a TOML file, then `GAVEL_*` environment overrides on top.
    pub fn load_with_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        let file: ConfigFile =
            toml::from_str(&source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::builder().merge_file(file).merge_env()?.build()
    }

    /// Defaults overridden by `GAVEL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().merge_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.server_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingValue("server_url"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.validation_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "validation_attempts",
                reason: "at least one attempt is required".to_string(),
            });
        }
        if self.revalidate_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "revalidate_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    request_timeout: Option<Duration>,
    validation_attempts: Option<u32>,
    validation_backoff_unit: Option<Duration>,
    revalidate_interval: Option<Duration>,
    store_path: Option<PathBuf>,
    endpoints: BTreeMap<String, Vec<String>>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the number of startup validation attempts
    pub fn validation_attempts(mut self, attempts: u32) -> Self {
        self.validation_attempts = Some(attempts);
        self
    }

    /// Set the linear backoff unit used between startup validation attempts
    pub fn validation_backoff_unit(mut self, unit: Duration) -> Self {
        self.validation_backoff_unit = Some(unit);
        self
    }

    /// Set the background re-validation period
    pub fn revalidate_interval(mut self, interval: Duration) -> Self {
        self.revalidate_interval = Some(interval);
        self
    }

    /// Set the credential file location
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Replace the candidate paths for one endpoint
    pub fn endpoint(mut self, name: impl Into<String>, paths: Vec<String>) -> Self {
        self.endpoints.insert(name.into(), paths);
        self
    }

    fn merge_file(mut self, file: ConfigFile) -> Self {
        if let Some(url) = file.server_url {
            self.server_url = Some(url);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(attempts) = file.validation_attempts {
            self.validation_attempts = Some(attempts);
        }
        if let Some(ms) = file.validation_backoff_ms {
            self.validation_backoff_unit = Some(Duration::from_millis(ms));
        }
        if let Some(secs) = file.revalidate_interval_secs {
            self.revalidate_interval = Some(Duration::from_secs(secs));
        }
        if let Some(path) = file.store_path {
            self.store_path = Some(path);
        }
        self.endpoints.extend(file.endpoints);
        self
    }

    /// Apply `GAVEL_*` environment overrides.
    pub fn merge_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(url) = std::env::var("GAVEL_API_URL") {
            self.server_url = Some(url);
        }
        if let Some(secs) = env_u64("GAVEL_REQUEST_TIMEOUT_SECS")? {
            self.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = env_u64("GAVEL_REVALIDATE_SECS")? {
            self.revalidate_interval = Some(Duration::from_secs(secs));
        }
        if let Ok(path) = std::env::var("GAVEL_STORE_PATH") {
            self.store_path = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let mut server_url = self.server_url.unwrap_or(defaults.server_url);
        if !server_url.ends_with('/') {
            server_url.push('/');
        }

        let config = AppConfig {
            server_url,
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            validation_attempts: self
                .validation_attempts
                .unwrap_or(defaults.validation_attempts),
            validation_backoff_unit: self
                .validation_backoff_unit
                .unwrap_or(defaults.validation_backoff_unit),
            revalidate_interval: self
                .revalidate_interval
                .unwrap_or(defaults.revalidate_interval),
            store_path: self.store_path,
            endpoints: self.endpoints,
        };
        config.validate()?;
        Ok(config)
    }
}

fn env_u64(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                field: key,
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}
