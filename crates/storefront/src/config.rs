//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `BACKEND_API_URL` - Base URL of the backend REST API (products, cart, orders, users, coupons)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_CHAT_URL` - Base URL of the chat service (default: `BACKEND_API_URL`)
//! - `BACKEND_API_KEY` - Server-to-server API key sent as `x-api-key`
//! - `BACKEND_TIMEOUT_SECS` - HTTP client timeout (default: 10)
//! - `CART_SYNC_RETRIES` - Attempts for cart sync calls (default: 3)
//! - `CART_SYNC_RETRY_DELAY_MS` - Base delay between attempts (default: 500)
//! - `CURRENCY` - Catalogue currency, `VND` or `USD` (default: VND)
//! - `LOG_FORMAT` - `json` for JSON log lines (default: human readable)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.1)
//! - `STATIC_DIR` - Directory served under `/static` (default: crates/storefront/static)

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use shopfront_core::CurrencyCode;
use thiserror::Error;
use url::Url;

use crate::api::retry::RetryPolicy;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Currency the catalogue is priced in
    pub currency: CurrencyCode,
    /// Backend REST API configuration
    pub backend: BackendConfig,
    /// Retry policy for cart synchronisation calls
    pub cart_sync_retry: RetryPolicy,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry performance traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Directory of static assets
    pub static_dir: PathBuf,
}

/// Backend REST API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL for products, cart, coupons, orders and users
    pub api_url: Url,
    /// Base URL for the chat service
    pub chat_url: Url,
    /// Optional server-to-server API key
    pub api_key: Option<SecretString>,
    /// Request timeout for every backend call
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url.as_str())
            .field("chat_url", &self.chat_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BackendConfig {
    /// Build a backend configuration pointing both services at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn for_url(api_url: &str) -> Result<Self, ConfigError> {
        let api_url = parse_base_url("BACKEND_API_URL", api_url)?;
        Ok(Self {
            chat_url: api_url.clone(),
            api_url,
            api_key: None,
            timeout: Duration::from_secs(10),
        })
    }

    /// The API key, if configured.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|key| key.expose_secret())
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let currency = parse_env("CURRENCY", "VND")?;

        let backend = BackendConfig::from_env()?;

        let cart_sync_retry = RetryPolicy::new(
            parse_env("CART_SYNC_RETRIES", "3")?,
            Duration::from_millis(parse_env("CART_SYNC_RETRY_DELAY_MS", "500")?),
        );

        let log_json = get_optional_env("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json"));

        Ok(Self {
            host,
            port,
            base_url,
            currency,
            backend,
            cart_sync_retry,
            log_json,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
            static_dir: PathBuf::from(
                get_optional_env("STATIC_DIR")
                    .unwrap_or_else(|| "crates/storefront/static".to_string()),
            ),
        })
    }

    /// Local defaults against the backend at `api_url`, without Sentry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse.
    pub fn for_backend(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            currency: CurrencyCode::default(),
            backend: BackendConfig::for_url(api_url)?,
            cart_sync_retry: RetryPolicy::default(),
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
            static_dir: PathBuf::from("crates/storefront/static"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_url = parse_base_url("BACKEND_API_URL", &get_required_env("BACKEND_API_URL")?)?;
        let chat_url = match get_optional_env("BACKEND_CHAT_URL") {
            Some(raw) => parse_base_url("BACKEND_CHAT_URL", &raw)?,
            None => api_url.clone(),
        };
        let api_key = get_optional_env("BACKEND_API_KEY")
            .map(|key| {
                validate_secret_strength(&key, "BACKEND_API_KEY")?;
                Ok::<_, ConfigError>(SecretString::from(key))
            })
            .transpose()?;
        let timeout = Duration::from_secs(parse_env("BACKEND_TIMEOUT_SECS", "10")?);

        Ok(Self {
            api_url,
            chat_url,
            api_key,
            timeout,
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

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_optional_env(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a base URL and make sure it ends with `/` so `Url::join` appends.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut normalised = raw.trim().to_string();
    if !normalised.ends_with('/') {
        normalised.push('/');
    }
    let url = Url::parse(&normalised)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated key."
            ),
        ));
    }

    Ok(())
}
