//! Rate limiting middleware for the public authentication endpoints.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use crate::config::RateLimitConfig;
use crate::web::error::ApiError;

/// Token bucket per client IP.
pub type KeyedRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// How often idle buckets are dropped.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(180);

/// Shared per-IP limiter.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<KeyedRateLimiter>,
    trust_forwarded_headers: bool,
}

impl RateLimitState {
    /// Create a limiter refilling `per_second` tokens with room for `burst`.
    pub fn new(per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(rate);
        let quota = Quota::per_second(rate).allow_burst(burst);
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            trust_forwarded_headers: false,
        }
    }

    /// Key clients on proxy headers instead of the peer address.
    pub fn trusting_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.auth_per_second, config.auth_burst)
            .trusting_forwarded_headers(config.trust_forwarded_headers)
    }

    /// Bucket key for a request.
    pub fn client_key(&self, req: &Request<Body>) -> String {
        get_client_ip(req, self.trust_forwarded_headers)
    }

    /// Take one token from `ip`'s bucket.
    pub fn check(&self, ip: &str) -> bool {
        self.limiter.check_key(&ip.to_string()).is_ok()
    }

    /// Drop buckets that have refilled completely.
    pub fn sweep(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of tracked clients.
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }

    /// Start a background task to periodically sweep idle buckets.
    pub fn start_sweep_task(&self) {
        let state = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                state.sweep();
                tracing::debug!(clients = state.tracked(), "Rate limiter swept");
            }
        });
    }
}

/// Extract client IP from request.
///
/// `X-Forwarded-For` and `X-Real-IP` are client-controlled unless a proxy
/// rewrites them, so they are only read when `trust_forwarded` is set.
/// Otherwise the peer address is used.
pub fn get_client_ip(req: &Request<Body>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(ip) = forwarded_ip(req) {
            return ip;
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

fn forwarded_ip(req: &Request<Body>) -> Option<String> {
    if let Some(forwarded) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        // first hop is the client
        if let Some(ip) = forwarded.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    req.headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Rate limiting middleware for public auth endpoints.
pub async fn auth_rate_limit(state: RateLimitState, req: Request<Body>, next: Next) -> Response {
    let ip = state.client_key(&req);

    if !state.check(&ip) {
        tracing::warn!(ip = %ip, path = %req.uri().path(), "Auth rate limit exceeded");
        return ApiError::too_many_requests().into_response();
    }

    next.run(req).await
}
