//! Page routes, gated with redirects rather than JSON errors

use axum::{middleware, routing::get, Router};

use crate::handlers::pages;
use crate::middleware::{require_admin, require_login};
use crate::state::AppState;

pub fn page_routes(state: AppState) -> Router<AppState> {
    let dashboard = Router::new()
        .route("/dashboard", get(pages::dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_login));

    let admin = Router::new()
        .route("/admin", get(pages::admin_console))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    Router::new()
        .merge(dashboard)
        .merge(admin)
        .route("/login", get(pages::login_page))
        .route("/unauthorized", get(pages::unauthorized))
}
