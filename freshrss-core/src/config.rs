use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_PATH: &str = "/api/greader.php";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub requests: RequestConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_api_path")]
    pub api_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub request_timeout_seconds: u64,
    /// Total attempts for idempotent reads.
    pub retry_attempts: u32,
    /// Total attempts for edit-tag.
    pub write_retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub default_search_limit: usize,
    pub default_summary_length: usize,
    pub search_overfetch_factor: usize,
    pub max_fetch: usize,
}

fn default_api_path() -> String {
    DEFAULT_API_PATH.to_owned()
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            retry_attempts: 3,
            write_retry_attempts: 2,
            retry_backoff_ms: 250,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            default_search_limit: 10,
            default_summary_length: 500,
            search_overfetch_factor: 4,
            max_fetch: 1000,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_path", &self.api_path)
            .finish()
    }
}

impl RequestConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl ReaderConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            connection: ConnectionConfig {
                base_url: base_url.into(),
                username: username.into(),
                password: password.into(),
                api_path: default_api_path(),
            },
            requests: RequestConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Reads `FRESHRSS_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, then validates it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let mut config = Self::new(
            required("FRESHRSS_URL")?,
            required("FRESHRSS_USERNAME")?,
            required("FRESHRSS_PASSWORD")?,
        );
        if let Some(path) = lookup("FRESHRSS_API_PATH").filter(|v| !v.trim().is_empty()) {
            config.connection.api_path = path;
        }
        if let Some(raw) = lookup("FRESHRSS_TIMEOUT_SECONDS") {
            config.requests.request_timeout_seconds =
                parse_number("FRESHRSS_TIMEOUT_SECONDS", &raw)?;
        }
        if let Some(raw) = lookup("FRESHRSS_RETRY_ATTEMPTS") {
            config.requests.retry_attempts = parse_number("FRESHRSS_RETRY_ATTEMPTS", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads the JSON form of the config and validates it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ReaderConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let conn = &self.connection;
        if conn.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("base_url"));
        }
        if conn.username.trim().is_empty() {
            return Err(ConfigError::Missing("username"));
        }
        if conn.password.is_empty() {
            return Err(ConfigError::Missing("password"));
        }
        if !conn.api_path.starts_with('/') {
            return Err(invalid("api_path", "must start with '/'"));
        }
        self.api_url()?;

        if self.requests.request_timeout_seconds == 0 {
            return Err(invalid("request_timeout_seconds", "must be positive"));
        }
        if self.requests.retry_attempts == 0 || self.requests.write_retry_attempts == 0 {
            return Err(invalid("retry_attempts", "at least one attempt is required"));
        }
        let out = &self.output;
        if out.default_limit == 0 || out.max_limit == 0 || out.default_search_limit == 0 {
            return Err(invalid("output", "limits must be positive"));
        }
        if out.search_overfetch_factor == 0 || out.max_fetch == 0 {
            return Err(invalid("output", "fetch caps must be positive"));
        }
        Ok(())
    }

    /// Base URL joined with the API path, without a trailing slash.
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let base = self.connection.base_url.trim_end_matches('/');
        let path = self.connection.api_path.trim_end_matches('/');
        let url = Url::parse(&format!("{base}{path}"))
            .map_err(|e| invalid("base_url", &e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("base_url", "scheme must be http or https"));
        }
        Ok(url)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(field, &format!("expected a number, got {raw:?}")))
}
