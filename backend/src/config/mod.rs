//! Configuration management for Canopy
//!
//! Loads and validates configuration from environment variables (and an
//! optional `.env` file), with per-environment defaults.

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL
    pub database_url: String,

    pub environment: Environment,

    pub port: u16,

    pub db_max_connections: u32,

    /// Log filter used when RUST_LOG is not set
    pub log_level: String,

    /// HS256 signing secret for access and refresh tokens
    pub jwt_secret: String,

    /// Access token TTL in seconds (default: 900 = 15 minutes)
    pub jwt_access_token_ttl_seconds: i64,

    /// Refresh token TTL in days (default: 7)
    pub jwt_refresh_token_ttl_days: i64,

    /// bcrypt work factor (4..=31)
    pub bcrypt_cost: u32,

    /// Accept the `user_email` cookie and the in-memory session table
    /// (default: on outside production)
    pub legacy_auth_enabled: bool,

    pub legacy_session_ttl_seconds: i64,

    /// Credential endpoint budget per client IP
    pub auth_rate_limit_per_minute: u32,

    /// Mark auth cookies `Secure`
    pub cookie_secure: bool,

    pub cors_allowed_origins: Option<String>,

    /// Take the client IP from `X-Forwarded-For`/`X-Real-IP`; only safe
    /// behind a proxy that overwrites them
    pub trust_proxy_headers: bool,
}

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = match env::var("ENVIRONMENT") {
            Ok(s) => s.parse::<Environment>()?,
            Err(_) => Environment::Development,
        };

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://canopy.db".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 5u32);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()))
            }
            _ => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let jwt_access_token_ttl_seconds = parse_or("JWT_ACCESS_TOKEN_TTL_SECONDS", 900i64);
        let jwt_refresh_token_ttl_days = parse_or("JWT_REFRESH_TOKEN_TTL_DAYS", 7i64);

        let bcrypt_cost = parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST);
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "BCRYPT_COST must be between 4 and 31, got {}",
                bcrypt_cost
            )));
        }

        let legacy_auth_enabled =
            parse_bool_or("LEGACY_AUTH_ENABLED", default_legacy_auth(&environment));
        let legacy_session_ttl_seconds = parse_or("LEGACY_SESSION_TTL_SECONDS", 86_400i64);
        let auth_rate_limit_per_minute = parse_or("AUTH_RATE_LIMIT_PER_MINUTE", 20u32);
        let cookie_secure = parse_bool_or("COOKIE_SECURE", environment.is_production());

        let trust_proxy_headers = parse_bool_or("TRUST_PROXY_HEADERS", false);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections,
            log_level,
            jwt_secret,
            jwt_access_token_ttl_seconds,
            jwt_refresh_token_ttl_days,
            bcrypt_cost,
            legacy_auth_enabled,
            legacy_session_ttl_seconds,
            auth_rate_limit_per_minute,
            cookie_secure,
            cors_allowed_origins,
            trust_proxy_headers,
        })
    }

    /// Settings suitable for tests and local tooling: in-memory database,
    /// cheap password hashing.
    pub fn for_tests() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            environment: Environment::Development,
            port: 0,
            db_max_connections: 1,
            log_level: "debug".to_string(),
            jwt_secret: "test-secret-key".to_string(),
            jwt_access_token_ttl_seconds: 900,
            jwt_refresh_token_ttl_days: 7,
            bcrypt_cost: 4,
            legacy_auth_enabled: true,
            legacy_session_ttl_seconds: 3600,
            auth_rate_limit_per_minute: 1000,
            cookie_secure: false,
            cors_allowed_origins: None,
            trust_proxy_headers: false,
        }
    }
}

/// The `user_email` cookie is client-controlled, so legacy auth is opt-in
/// for production.
fn default_legacy_auth(environment: &Environment) -> bool {
    !environment.is_production()
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_bool_or(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_from_str() {
        assert_eq!(
            "dev".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!(
            "development".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!(
            "staging".parse::<Environment>().unwrap(),
            Environment::Staging
        );
        assert_eq!(
            "PROD".parse::<Environment>().unwrap(),
            Environment::Production
        );

        assert!("invalid".parse::<Environment>().is_err());
    }

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_environment_as_str() {
        assert_eq!(Environment::Development.as_str(), "development");
        assert_eq!(Environment::Production.as_str(), "production");
    }

    #[test]
    fn test_test_config_is_cheap_and_in_memory() {
        let config = Config::for_tests();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.bcrypt_cost, 4);
        assert!(!config.cookie_secure);
    }

    #[test]
    fn test_legacy_auth_is_off_by_default_in_production() {
        assert!(default_legacy_auth(&Environment::Development));
        assert!(default_legacy_auth(&Environment::Staging));
        assert!(!default_legacy_auth(&Environment::Production));
    }

    #[test]
    fn test_config_error_types() {
        let err = ConfigError::MissingEnvVar("JWT_SECRET".to_string());
        assert!(err.to_string().contains("JWT_SECRET"));

        let err = ConfigError::InvalidPort("invalid".to_string());
        assert!(err.to_string().contains("invalid"));
    }
}
