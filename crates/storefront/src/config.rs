//! Sync engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_API_URL` - GraphQL endpoint of the storefront backend
//!
//! ## Optional
//! - `STOREFRONT_CHANNEL` - Sales channel slug (default: default-channel)
//! - `STOREFRONT_STATE_FILE` - Credential and cart file (default: .storefront-sync.json)
//! - `STOREFRONT_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_CHANNEL: &str = "default-channel";
const DEFAULT_STATE_FILE: &str = ".storefront-sync.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote API settings
    pub api: ApiConfig,
    /// Where credentials and the cart snapshot are persisted
    pub state_file: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Remote API settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// GraphQL endpoint
    pub endpoint: Url,
    /// Sales channel slug sent with checkout and voucher calls
    pub channel: String,
    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
}

impl ApiConfig {
    /// Settings for `endpoint` with default channel and timeout.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            channel: DEFAULT_CHANNEL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        let endpoint = parse_endpoint(
            "STOREFRONT_API_URL",
            &get_required_env("STOREFRONT_API_URL")?,
        )?;
        let channel = get_env_or_default("STOREFRONT_CHANNEL", DEFAULT_CHANNEL);
        if channel.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_CHANNEL".to_string(),
                "must not be empty".to_string(),
            ));
        }
        let request_timeout = get_optional_env("STOREFRONT_REQUEST_TIMEOUT_SECS").map_or(
            Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            |value| parse_timeout("STOREFRONT_REQUEST_TIMEOUT_SECS", &value),
        )?;

        Ok(Self {
            endpoint,
            channel,
            request_timeout,
        })
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            api: ApiConfig::from_env()?,
            state_file: PathBuf::from(get_env_or_default("STOREFRONT_STATE_FILE", DEFAULT_STATE_FILE)),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an absolute http(s) URL.
fn parse_endpoint(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{other}'"),
        )),
    }
}

/// Parse a positive number of seconds.
fn parse_timeout(key: &str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        )),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}
