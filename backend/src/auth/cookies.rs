//! Session cookie management
//!
//! Access and refresh tokens travel in HTTP-only cookies. The `user_email`
//! and `session_token` cookies belong to the legacy auth path and are only
//! read (the session cookie is also written when legacy auth is enabled).

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use super::jwt::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub const LEGACY_EMAIL_COOKIE: &str = "user_email";
pub const LEGACY_SESSION_COOKIE: &str = "session_token";

const ALL_COOKIES: [&str; 4] = [
    ACCESS_TOKEN_COOKIE,
    REFRESH_TOKEN_COOKIE,
    LEGACY_EMAIL_COOKIE,
    LEGACY_SESSION_COOKIE,
];

#[derive(Debug, Clone)]
pub struct CookieManager {
    secure: bool,
}

impl CookieManager {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    fn build(&self, name: &'static str, value: String, max_age_seconds: i64) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(Duration::seconds(max_age_seconds))
            .build()
    }

    /// Attach both token cookies, each living as long as its token
    pub fn set_auth_cookies(&self, jar: CookieJar, tokens: &TokenPair) -> CookieJar {
        jar.add(self.build(
            ACCESS_TOKEN_COOKIE,
            tokens.access_token.clone(),
            tokens.access_expires_in,
        ))
        .add(self.build(
            REFRESH_TOKEN_COOKIE,
            tokens.refresh_token.clone(),
            tokens.refresh_expires_in,
        ))
    }

    pub fn set_legacy_session(&self, jar: CookieJar, token: &str, ttl_seconds: i64) -> CookieJar {
        jar.add(self.build(LEGACY_SESSION_COOKIE, token.to_string(), ttl_seconds))
    }

    /// Expire every auth cookie, legacy ones included, whether or not the
    /// request carried it
    pub fn clear_auth_cookies(&self, jar: CookieJar) -> CookieJar {
        ALL_COOKIES.into_iter().fold(jar, |jar, name| {
            let mut cookie = self.build(name, String::new(), 0);
            cookie.make_removal();
            jar.add(cookie)
        })
    }
}

fn non_empty(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn access_token(jar: &CookieJar) -> Option<String> {
    non_empty(jar, ACCESS_TOKEN_COOKIE)
}

pub fn refresh_token(jar: &CookieJar) -> Option<String> {
    non_empty(jar, REFRESH_TOKEN_COOKIE)
}

/// Email from the legacy `user_email` cookie. Browsers set it
/// URL-encoded, so `%40` is turned back into `@`.
pub fn legacy_email(jar: &CookieJar) -> Option<String> {
    non_empty(jar, LEGACY_EMAIL_COOKIE).map(|v| v.replace("%40", "@"))
}

pub fn legacy_session(jar: &CookieJar) -> Option<String> {
    non_empty(jar, LEGACY_SESSION_COOKIE)
}
