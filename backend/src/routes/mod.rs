//! Route definitions for the Canopy auth server

mod admin;
mod auth;
mod pages;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::handlers::health_check;
use crate::middleware;
use crate::state::AppState;

pub use admin::admin_routes;
pub use auth::auth_routes;
pub use pages::page_routes;

/// Full application router with the shared middleware stack
pub fn create_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes(state.clone()))
        .merge(admin_routes(state.clone()))
        .merge(page_routes(state.clone()))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::security_headers))
        .layer(axum_middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(config));

    if config.environment.is_production() {
        router.layer(axum_middleware::from_fn(middleware::hsts_header))
    } else {
        router
    }
}

fn configure_cors(config: &Config) -> CorsLayer {
    let Some(allowed) = config.cors_allowed_origins.as_deref() else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = allowed
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    // cookies ride along, so origins and headers must be explicit
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
