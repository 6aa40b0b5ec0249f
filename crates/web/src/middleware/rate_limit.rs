//! Per-client rate limits for form posts and HTMX fragments.
//!
//! - [`auth_rate_limiter`]: sign-in, sign-up, phone codes and CRECI uploads
//! - [`api_rate_limiter`]: draft autosave, favorites and carousel steps
//!
//! Clients are keyed by IP. Behind the edge proxy the peer address is the
//! proxy's, so the forwarded client address wins when present.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::key_extractor::KeyExtractor;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Forwarding headers, most trusted first. `x-forwarded-for` holds a chain
/// whose first entry is the client.
const CLIENT_IP_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)?
            .to_str()
            .ok()?
            .split(',')
            .next()?
            .trim()
            .parse()
            .ok()
    })
}

/// Keys requests by client IP: forwarded address, else the peer address.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        forwarded_ip(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// One token every `period_secs`, up to `burst` at once.
///
/// # Panics
///
/// Panics if `period_secs` or `burst` is zero; callers pass constants.
fn limiter(period_secs: u64, burst: u32) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(period_secs)
        .burst_size(burst)
        .finish()
        .expect("rate limiter period and burst are non-zero");
    GovernorLayer::new(Arc::new(config))
}

/// Credential and upload posts: burst of 5, then one every 6 seconds.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    limiter(6, 5)
}

/// HTMX fragments and autosave: burst of 50, then one per second.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    limiter(1, 50)
}
