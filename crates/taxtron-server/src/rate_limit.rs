//! Per-client token-bucket rate limiting for the HTTP API.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    touched: Instant,
}

impl Bucket {
    fn full(burst: f64) -> Self {
        Self {
            tokens: burst,
            touched: Instant::now(),
        }
    }

    fn take(&mut self, per_sec: f64, burst: f64) -> bool {
        let now = Instant::now();
        let refill = now.duration_since(self.touched).as_secs_f64() * per_sec;
        self.tokens = (self.tokens + refill).min(burst);
        self.touched = now;

        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
    per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(per_sec: f64, burst: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            per_sec,
            burst,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.rate_limit_per_sec, config.rate_limit_burst)
    }

    /// Spend one token for `ip`; `false` when its bucket is empty.
    pub async fn allow(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(ip)
            .or_insert_with(|| Bucket::full(self.burst))
            .take(self.per_sec, self.burst)
    }

    /// Forget clients that have been quiet for longer than `idle`.
    pub async fn purge_idle(&self, idle: Duration) {
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, b| b.touched.elapsed() < idle);
        let purged = before - buckets.len();
        if purged > 0 {
            tracing::debug!(purged, remaining = buckets.len(), "rate limiter buckets purged");
        }
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(ip) = client_ip(&req) {
        if !limiter.allow(ip).await {
            warn!(ip = %ip, path = %req.uri().path(), "rate limit exceeded");
            return ServerError::RateLimited.into_response();
        }
    }
    next.run(req).await
}

/// The peer address, else the first `X-Forwarded-For` hop, else `X-Real-IP`.
fn client_ip<B>(req: &axum::http::Request<B>) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip());
    }

    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| header("x-real-ip").and_then(|v| v.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_then_refuse() {
        let limiter = RateLimiter::new(1.0, 3.0);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.allow(ip).await);
        }
        assert!(!limiter.allow(ip).await);
    }

    #[tokio::test]
    async fn clients_are_independent() {
        let limiter = RateLimiter::new(1.0, 1.0);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.allow(a).await);
        assert!(!limiter.allow(a).await);
        assert!(limiter.allow(b).await);
    }

    #[tokio::test]
    async fn purge_drops_idle_clients() {
        let limiter = RateLimiter::new(1.0, 2.0);
        limiter.allow("192.168.1.1".parse().unwrap()).await;

        limiter.purge_idle(Duration::ZERO).await;
        assert!(limiter.buckets.lock().await.is_empty());
    }

    #[test]
    fn forwarded_header_is_used_without_peer_address() {
        let req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some("203.0.113.7".parse().unwrap()));

        let req = axum::http::Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some("198.51.100.2".parse().unwrap()));
    }
}
