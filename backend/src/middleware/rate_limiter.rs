//! Rate limiting for credential endpoints

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};
use tokio::sync::RwLock;

use super::client_ip;
use crate::error::ApiError;
use crate::services::{AuditOutcome, AuditRecord};
use crate::state::AppState;

/// Token bucket for rate limiting
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(max_tokens: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_update: Instant::now(),
        }
    }

    fn try_consume(&mut self, tokens_per_second: f64, max_tokens: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * tokens_per_second).min(max_tokens);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-client token buckets, burst of twice the per-minute budget
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    tokens_per_second: f64,
    max_tokens: f64,
}

impl RateLimiter {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let requests_per_minute = requests_per_minute.max(1);
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            tokens_per_second: f64::from(requests_per_minute) / 60.0,
            max_tokens: f64::from(requests_per_minute * 2),
        }
    }

    /// Check if a request is allowed
    pub async fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.max_tokens));

        bucket.try_consume(self.tokens_per_second, self.max_tokens)
    }

    /// Drop buckets idle for longer than `max_age`
    pub async fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();

        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
    }
}

pub const BOOTSTRAP_PATH: &str = "/api/admin/bootstrap";

/// Middleware: one bucket per client IP and path
///
/// The client is the TCP peer unless proxy headers are trusted. Rejected
/// bootstrap attempts still land in the audit log.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ip = client_ip(
        request.extensions(),
        request.headers(),
        state.trust_proxy_headers,
    );
    let client = ip.clone().unwrap_or_else(|| "unknown".to_string());
    let path = request.uri().path().to_string();
    let key = format!("{}|{}", client, path);

    if !state.rate_limiter.check(&key).await {
        tracing::warn!(client = %client, path = %path, "Rate limit exceeded");

        if path == BOOTSTRAP_PATH {
            state
                .audit_log
                .record(
                    AuditRecord::new("admin_bootstrap", AuditOutcome::Failure)
                        .reason(ApiError::TooManyRequests.to_string())
                        .client_ip(ip),
                )
                .await;
        }

        return ApiError::TooManyRequests.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_burst() {
        let limiter = RateLimiter::per_minute(5);

        // burst capacity = 2x
        for _ in 0..10 {
            assert!(limiter.check("test-client").await);
        }

        assert!(!limiter.check("test-client").await);
    }

    #[tokio::test]
    async fn test_rate_limiter_different_clients() {
        let limiter = RateLimiter::per_minute(1);

        assert!(limiter.check("client-a").await);
        assert!(limiter.check("client-b").await);
        assert!(limiter.check("client-a").await);
        assert!(limiter.check("client-b").await);
        assert!(!limiter.check("client-a").await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_buckets() {
        let limiter = RateLimiter::per_minute(1);
        limiter.check("client-a").await;

        limiter.cleanup(Duration::from_secs(3600)).await;
        assert_eq!(limiter.buckets.read().await.len(), 1);

        limiter.cleanup(Duration::ZERO).await;
        assert!(limiter.buckets.read().await.is_empty());
    }
}
