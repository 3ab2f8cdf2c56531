//! Admin routes

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::admin;
use crate::middleware::rate_limit;
use crate::state::AppState;

/// Create admin routes. Role checks happen in the handlers' extractors so
/// rejections come back as JSON.
pub fn admin_routes(state: AppState) -> Router<AppState> {
    let bootstrap = Router::new()
        .route("/api/admin/bootstrap", post(admin::bootstrap_admin))
        .route_layer(middleware::from_fn_with_state(state, rate_limit));

    Router::new()
        .merge(bootstrap)
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id/role", put(admin::update_user_role))
        .route("/api/admin/audit", get(admin::audit_events))
}
