//! Authentication routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::middleware::rate_limit;
use crate::state::AppState;

/// Create authentication routes
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let credential_routes = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route_layer(middleware::from_fn_with_state(state, rate_limit));

    Router::new()
        .merge(credential_routes)
        .route("/api/auth/refresh", post(auth::refresh_token))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::get_current_user))
        .route("/api/auth/change-password", post(auth::change_password))
}
