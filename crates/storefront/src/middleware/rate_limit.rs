//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Provides rate limiters for the endpoints that cost the backend the most:
//! - `auth_rate_limiter`: sign-in and registration (~10/min)
//! - `chat_rate_limiter`: chat messages, each of which runs a model (~30/min)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Key extractor that reads the client IP from proxy headers, then from the
/// socket address.
///
/// Requests with neither (in-process tests, unusual proxies) share one bucket
/// keyed on `0.0.0.0` instead of failing.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

/// Proxy headers carrying a single client IP, in order of trust.
const SINGLE_IP_HEADERS: &[&str] = &["cf-connecting-ip", "x-real-ip"];

fn header_ip<T>(req: &Request<T>, name: &str) -> Option<IpAddr> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        if let Some(ip) = SINGLE_IP_HEADERS
            .iter()
            .find_map(|name| header_ip(req, name))
        {
            return Ok(ip);
        }

        // X-Forwarded-For (first IP in the chain)
        if let Some(ip) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        Ok(req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| info.0.ip()))
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(replenish_every_secs: u64, burst: u32) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(replenish_every_secs)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// Create rate limiter for auth endpoints: ~10 requests per minute per IP.
///
/// Configuration: 1 request every 6 seconds (replenish), burst of 5.
///
/// # Panics
///
/// This function will not panic. `per_second(6)` and `burst_size(5)` are
/// non-zero, which is all `GovernorConfigBuilder` requires.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    limiter(6, 5).expect("rate limiter config with per_second(6) and burst_size(5) is valid")
}

/// Create rate limiter for chat messages: ~30 requests per minute per IP.
///
/// Configuration: 1 request every 2 seconds (replenish), burst of 10.
///
/// # Panics
///
/// This function will not panic. `per_second(2)` and `burst_size(10)` are
/// non-zero, which is all `GovernorConfigBuilder` requires.
#[must_use]
pub fn chat_rate_limiter() -> RateLimiterLayer {
    limiter(2, 10).expect("rate limiter config with per_second(2) and burst_size(10) is valid")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/auth/login");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_prefers_cloudflare_header() {
        let req = request(&[
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);
        assert_eq!(
            ClientIpKeyExtractor.extract(&req).unwrap(),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_uses_first_forwarded_ip() {
        let req = request(&[("x-forwarded-for", "198.51.100.4, 10.0.0.2")]);
        assert_eq!(
            ClientIpKeyExtractor.extract(&req).ok(),
            Some(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 4)))
        );
    }

    #[test]
    fn test_falls_back_to_connect_info_then_shared_bucket() {
        let mut req = request(&[]);
        assert_eq!(
            ClientIpKeyExtractor.extract(&req).ok(),
            Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
        );

        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 9], 4000))));
        assert_eq!(
            ClientIpKeyExtractor.extract(&req).ok(),
            Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9)))
        );
    }

    #[test]
    fn test_limiters_build() {
        let _auth = auth_rate_limiter();
        let _chat = chat_rate_limiter();
    }
}
