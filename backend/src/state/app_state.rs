//! Application state shared across handlers

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::{AuthService, CookieManager, CredentialStore, SessionStore, TokenIssuer};
use crate::config::Config;
use crate::db::{self, DbError};
use crate::middleware::RateLimiter;
use crate::services::AuditLog;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub auth_service: Arc<AuthService>,
    pub audit_log: Arc<AuditLog>,
    pub sessions: SessionStore,
    pub cookies: CookieManager,
    pub rate_limiter: RateLimiter,
    pub legacy_auth_enabled: bool,
    pub trust_proxy_headers: bool,
}

impl AppState {
    /// Wire services on top of an already migrated pool
    pub fn new(db_pool: SqlitePool, config: &Config) -> Self {
        let store = CredentialStore::new(db_pool.clone(), config.bcrypt_cost);
        let tokens = TokenIssuer::new(
            &config.jwt_secret,
            config.jwt_access_token_ttl_seconds,
            config.jwt_refresh_token_ttl_days,
        );

        Self {
            auth_service: Arc::new(AuthService::new(store, tokens)),
            audit_log: Arc::new(AuditLog::new(db_pool.clone())),
            sessions: SessionStore::new(config.legacy_session_ttl_seconds),
            cookies: CookieManager::new(config.cookie_secure),
            rate_limiter: RateLimiter::per_minute(config.auth_rate_limit_per_minute),
            legacy_auth_enabled: config.legacy_auth_enabled,
            trust_proxy_headers: config.trust_proxy_headers,
            db_pool,
        }
    }

    /// Open the database, run migrations and wire services
    pub async fn from_config(config: &Config) -> Result<Self, DbError> {
        let pool = db::create_pool(config).await?;
        db::run_migrations(&pool).await?;
        Ok(Self::new(pool, config))
    }
}
