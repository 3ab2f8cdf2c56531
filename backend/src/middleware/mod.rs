//! Middleware for the Canopy API
//!
//! Request tracing, rate limiting, security headers and the authorization
//! gate.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{request::Parts, Extensions, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::state::AppState;

pub use auth::{
    require_admin, require_login, resolve_identity, AdminUser, AuthenticatedUser,
    CurrentIdentity, Identity, IdentitySource,
};
pub use rate_limiter::{rate_limit, RateLimiter};
pub use security::{hsts_header, security_headers};
pub use tracing::request_tracing;

/// Address of the TCP peer, present when served with connect info
pub fn peer_ip(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Client IP claimed by proxy headers (`X-Forwarded-For`, then `X-Real-IP`).
/// Any client can set these.
pub fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Client IP: proxy headers only when `trust_proxy_headers` is set, the
/// peer address otherwise
pub fn client_ip(
    extensions: &Extensions,
    headers: &HeaderMap,
    trust_proxy_headers: bool,
) -> Option<String> {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(headers) {
            return Some(ip);
        }
    }
    peer_ip(extensions)
}

/// Extractor for [`client_ip`] under the configured proxy trust
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(ClientIp(client_ip(
            &parts.extensions,
            &parts.headers,
            state.trust_proxy_headers,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(forwarded_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(forwarded_ip(&headers).as_deref(), Some("10.0.0.9"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(forwarded_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_client_ip_ignores_proxy_headers_unless_trusted() {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 51000))));
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));

        assert_eq!(
            client_ip(&extensions, &headers, false).as_deref(),
            Some("192.0.2.10")
        );
        assert_eq!(
            client_ip(&extensions, &headers, true).as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(
            client_ip(&extensions, &HeaderMap::new(), true).as_deref(),
            Some("192.0.2.10")
        );
        assert_eq!(client_ip(&Extensions::new(), &headers, false), None);
    }
}
