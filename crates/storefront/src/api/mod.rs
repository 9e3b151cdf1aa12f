//! Client for the backend REST API.
//!
//! # Architecture
//!
//! - The backend is the source of truth for products, carts, coupons, orders
//!   and users; the storefront only mirrors what a visitor is working on.
//! - One shared `reqwest::Client` with the configured timeout.
//! - Catalogue reads are cached in-process via `moka` (5 minute TTL);
//!   cart, coupon, order and user calls are never cached.
//! - Responses may be wrapped in `{"success": .., "data": .., "message": ..}`
//!   or returned bare; both are accepted.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_storefront::api::ApiClient;
//!
//! let api = ApiClient::new(&config.backend, config.currency)?;
//! let page = api.list_products(1, 12, None).await?;
//! let coupon = api.validate_coupon("SALE10", subtotal).await?;
//! ```

mod cache;
pub mod cart;
pub mod coupons;
pub mod orders;
pub mod products;
pub mod retry;
pub mod types;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shopfront_core::CurrencyCode;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::BackendConfig;

use cache::CacheValue;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with an unexpected status.
    #[error("backend returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the body, if any.
        message: String,
    },

    /// Missing or expired bearer token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend refused the request (validation, business rule).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Body could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Path could not be joined onto the base URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Whether repeating the same call might succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Unauthorized(_)
            | Self::NotFound(_)
            | Self::Rejected(_)
            | Self::Parse(_)
            | Self::Url(_) => false,
        }
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the backend REST API.
///
/// Cheap to clone; all clones share the connection pool and cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    currency: CurrencyCode,
    cache: Cache<String, CacheValue>,
}

impl ApiClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: &BackendConfig, currency: CurrencyCode) -> Result<Self, ApiError> {
        let client = build_http_client(config)?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                currency,
                cache,
            }),
        })
    }

    /// Currency the catalogue is priced in.
    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.currency
    }

    /// `GET` a path and decode the (possibly enveloped) JSON body.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        self.execute::<(), T>(Method::GET, path, query, None, token).await
    }

    /// Send a JSON body and decode the (possibly enveloped) JSON response.
    async fn send<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        self.execute(method, path, &[], body, token).await
    }

    #[instrument(skip(self, query, body, token), fields(method = %method, path = %path))]
    async fn execute<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let url = self.inner.base_url.join(path)?;

        let mut request = self.inner.client.request(method, url).query(query);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let text = response.text().await?;

        if !status.is_success() {
            let message = error_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            tracing::warn!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(match status.as_u16() {
                401 | 403 => ApiError::Unauthorized(message),
                404 => ApiError::NotFound(message),
                400..=499 => ApiError::Rejected(message),
                code => ApiError::Status {
                    status: code,
                    message,
                },
            });
        }

        decode_body(&text).inspect_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to decode backend response"
            );
        })
    }
}

/// Build the shared HTTP client used for every backend call.
pub(crate) fn build_http_client(config: &BackendConfig) -> Result<reqwest::Client, ApiError> {
    Ok(reqwest::Client::builder()
        .default_headers(default_headers(config)?)
        .timeout(config.timeout)
        .build()?)
}

/// Headers sent with every backend call (the service API key, if any).
pub(crate) fn default_headers(config: &BackendConfig) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    if let Some(key) = config.api_key() {
        let value = HeaderValue::from_str(key)
            .map_err(|_| ApiError::Rejected("API key is not a valid header value".to_string()))?;
        headers.insert("x-api-key", value);
    }
    Ok(headers)
}

/// Decode a success body, unwrapping a `{"success", "data"}` envelope.
pub(crate) fn decode_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    let trimmed = text.trim();
    let value: serde_json::Value = if trimmed.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(trimmed)?
    };

    let value = match value {
        serde_json::Value::Object(mut map)
            if map.contains_key("data")
                && (map.contains_key("success") || map.contains_key("message")) =>
        {
            if map.get("success") == Some(&serde_json::Value::Bool(false)) {
                let message = map
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("request failed")
                    .to_string();
                return Err(ApiError::Rejected(message));
            }
            map.remove("data").unwrap_or(serde_json::Value::Null)
        }
        other => other,
    };

    Ok(serde_json::from_value(value)?)
}

/// Extract `message` or `error` from an error body.
pub(crate) fn error_message(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    ["message", "error"]
        .into_iter()
        .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        .map(ToString::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Thing {
        name: String,
    }

    #[test]
    fn test_decode_bare_body() {
        let thing: Thing = decode_body(r#"{"name":"bare"}"#).unwrap();
        assert_eq!(thing.name, "bare");
    }

    #[test]
    fn test_decode_enveloped_body() {
        let thing: Thing =
            decode_body(r#"{"success":true,"data":{"name":"wrapped"},"message":"ok"}"#).unwrap();
        assert_eq!(thing.name, "wrapped");
    }

    #[test]
    fn test_decode_failed_envelope_is_rejection() {
        let err = decode_body::<Thing>(r#"{"success":false,"data":null,"message":"Out of stock"}"#)
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref m) if m == "Out of stock"));
    }

    #[test]
    fn test_decode_empty_body_as_unit() {
        decode_body::<()>("").unwrap();
        decode_body::<()>("  ").unwrap();
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message":"Invalid coupon"}"#).as_deref(), Some("Invalid coupon"));
        assert_eq!(error_message(r#"{"error":"Forbidden"}"#).as_deref(), Some("Forbidden"));
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::RateLimited(1).is_retryable());
        assert!(ApiError::Status { status: 502, message: String::new() }.is_retryable());
        assert!(!ApiError::Rejected("bad".to_string()).is_retryable());
        assert!(!ApiError::Unauthorized("expired".to_string()).is_retryable());
    }

    #[test]
    fn test_api_client_is_clone_send_sync() {
        fn assert_traits<T: Clone + Send + Sync>() {}
        assert_traits::<ApiClient>();
    }
}
