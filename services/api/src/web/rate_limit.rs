//! services/api/src/web/rate_limit.rs
//!
//! IP-based rate limiting with `tower_governor`: a global limiter for the API
//! and a stricter one for the auth endpoints.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{governor::GovernorConfigBuilder, GovernorError, GovernorLayer};

/// Keys requests on the first proxy header that parses, then the peer address.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();

        if let Some(ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        if let Some(ip) = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return Ok(ip);
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(period_ms: u64, burst: u32) -> Option<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_millisecond(period_ms)
        .burst_size(burst)
        .finish()?;
    Some(GovernorLayer::new(Arc::new(config)))
}

/// Global limiter: `per_minute` requests per minute per IP, with a burst of the same size.
pub fn api_rate_limiter(per_minute: u32) -> Option<RateLimiterLayer> {
    let per_minute = per_minute.max(1);
    limiter(60_000 / u64::from(per_minute).min(60_000), per_minute)
}

/// Auth endpoints: about 10 requests per minute per IP, burst of 5.
pub fn auth_rate_limiter() -> Option<RateLimiterLayer> {
    limiter(6_000, 5)
}
