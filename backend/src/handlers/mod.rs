//! API handlers for the Canopy auth server

pub mod admin;
pub mod auth;
pub mod health;
pub mod pages;

use axum::extract::FromRequest;

use crate::error::ApiError;

pub use health::health_check;

pub use crate::middleware::auth::{AdminUser, AuthenticatedUser, CurrentIdentity};

/// `Json` whose rejections render as the API error envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
