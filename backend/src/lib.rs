//! Canopy auth server library
//!
//! Credential store, token issuing, session cookies and the authorization
//! gate behind the drone plant-monitoring dashboard.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use routes::create_router;
pub use state::AppState;
