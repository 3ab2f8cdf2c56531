//! Authorization gate
//!
//! Resolves who is calling, in priority order:
//! 1. a valid access token (cookie, then `Authorization: Bearer`)
//! 2. legacy auth: the `user_email` cookie, then the `session_token` cookie
//! 3. anonymous, with role `normal`
//!
//! API handlers use the extractors; page routes use [`require_login`] and
//! [`require_admin`], which redirect instead of answering with JSON.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};
use std::convert::Infallible;

use crate::auth::{cookies, AuthError};
use crate::error::ApiError;
use crate::models::UserRole;
use crate::state::AppState;

/// Where an identity was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    AccessToken,
    LegacyEmail,
    LegacySession,
    Anonymous,
}

impl IdentitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentitySource::AccessToken => "jwt",
            IdentitySource::LegacyEmail => "legacy_email",
            IdentitySource::LegacySession => "legacy_session",
            IdentitySource::Anonymous => "anonymous",
        }
    }
}

/// Resolved caller
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub role: UserRole,
    pub source: IdentitySource,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            email: None,
            role: UserRole::Normal,
            source: IdentitySource::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.role.is_admin()
    }
}

/// Resolve the caller from request headers. Never fails: anything that
/// does not check out falls through to the next source.
pub async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Identity {
    let jar = CookieJar::from_headers(headers);
    let tokens = state.auth_service.tokens();

    let bearer = headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().to_string());

    for token in cookies::access_token(&jar).into_iter().chain(bearer) {
        if let Some(claims) = tokens.verify_access(&token) {
            return Identity {
                user_id: Some(claims.user_id),
                email: Some(claims.email),
                role: claims.role,
                source: IdentitySource::AccessToken,
            };
        }
    }

    if !state.legacy_auth_enabled {
        return Identity::anonymous();
    }

    if let Some(email) = cookies::legacy_email(&jar) {
        match state.auth_service.store().get_user_by_email(&email).await {
            Ok(Some(user)) => {
                return Identity {
                    user_id: Some(user.id),
                    email: Some(user.email),
                    role: user.role,
                    source: IdentitySource::LegacyEmail,
                }
            }
            Ok(None) => tracing::debug!("Legacy email cookie names no user"),
            Err(e) => tracing::warn!(error = %e, "Legacy email lookup failed"),
        }
    }

    if let Some(token) = cookies::legacy_session(&jar) {
        if let Some(session) = state.sessions.get(&token).await {
            return Identity {
                user_id: Some(session.user_id),
                email: Some(session.email),
                role: session.role,
                source: IdentitySource::LegacySession,
            };
        }
    }

    Identity::anonymous()
}

/// What a protected route demands of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Admin,
}

/// Why the gate turned a caller away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    Unauthenticated,
    Forbidden,
}

pub fn authorize(identity: &Identity, requirement: Requirement) -> Result<(), GateRejection> {
    if !identity.is_authenticated() {
        return Err(GateRejection::Unauthenticated);
    }
    if requirement == Requirement::Admin && !identity.is_admin() {
        return Err(GateRejection::Forbidden);
    }
    Ok(())
}

/// Page or API call; decides how a rejection is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateContext {
    Api,
    Page,
}

impl GateContext {
    pub fn from_path(path: &str) -> Self {
        if path == "/api" || path.starts_with("/api/") {
            GateContext::Api
        } else {
            GateContext::Page
        }
    }
}

impl GateRejection {
    /// `target` is the rejected request's path and query, handed to the
    /// login page so it can send the user back.
    pub fn into_response_for(self, context: GateContext, target: &str) -> Response {
        match (context, self) {
            (GateContext::Api, GateRejection::Unauthenticated) => {
                ApiError::from(AuthError::NotAuthenticated).into_response()
            }
            (GateContext::Api, GateRejection::Forbidden) => {
                ApiError::from(AuthError::AdminRequired).into_response()
            }
            (GateContext::Page, GateRejection::Unauthenticated) => {
                Redirect::to(&format!("/login?redirect={}", urlencoding::encode(target)))
                    .into_response()
            }
            (GateContext::Page, GateRejection::Forbidden) => {
                Redirect::to("/unauthorized").into_response()
            }
        }
    }
}

async fn gate(state: &AppState, request: Request, next: Next, requirement: Requirement) -> Response {
    let (mut parts, body) = request.into_parts();
    let identity = resolve_identity(state, &parts.headers).await;

    if let Err(rejection) = authorize(&identity, requirement) {
        let path = parts.uri.path();
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or(path);
        tracing::debug!(
            path = %path,
            source = identity.source.as_str(),
            rejection = ?rejection,
            "Gate rejected request"
        );
        return rejection.into_response_for(GateContext::from_path(path), target);
    }

    parts.extensions.insert(identity);
    next.run(Request::from_parts(parts, body)).await
}

/// Middleware: any signed-in caller
pub async fn require_login(State(state): State<AppState>, request: Request, next: Next) -> Response {
    gate(&state, request, next, Requirement::Authenticated).await
}

/// Middleware: admins only
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    gate(&state, request, next, Requirement::Admin).await
}

/// Resolved caller, possibly anonymous
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(CurrentIdentity(identity.clone()));
        }
        let state = AppState::from_ref(state);
        Ok(CurrentIdentity(resolve_identity(&state, &parts.headers).await))
    }
}

/// Signed-in caller
///
/// ```rust,ignore
/// async fn protected_handler(AuthenticatedUser(user): AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, user {:?}", user.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl AuthenticatedUser {
    pub fn user_id(&self) -> i64 {
        // authorize() guarantees a user id
        self.0.user_id.unwrap_or_default()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentIdentity(identity) = CurrentIdentity::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        authorize(&identity, Requirement::Authenticated)
            .map_err(|r| r.into_response_for(GateContext::Api, parts.uri.path()))?;

        Ok(AuthenticatedUser(identity))
    }
}

/// Signed-in caller with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentIdentity(identity) = CurrentIdentity::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        authorize(&identity, Requirement::Admin)
            .map_err(|r| r.into_response_for(GateContext::Api, parts.uri.path()))?;

        Ok(AdminUser(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn identity(role: UserRole) -> Identity {
        Identity {
            user_id: Some(1),
            email: Some("pilot@example.com".to_string()),
            role,
            source: IdentitySource::AccessToken,
        }
    }

    #[test]
    fn test_anonymous_is_normal() {
        let anon = Identity::anonymous();
        assert_eq!(anon.role, UserRole::Normal);
        assert!(!anon.is_authenticated());
        assert!(!anon.is_admin());
    }

    #[test]
    fn test_authorize() {
        assert_eq!(
            authorize(&Identity::anonymous(), Requirement::Authenticated),
            Err(GateRejection::Unauthenticated)
        );
        assert_eq!(
            authorize(&Identity::anonymous(), Requirement::Admin),
            Err(GateRejection::Unauthenticated)
        );
        assert_eq!(
            authorize(&identity(UserRole::Pilot), Requirement::Authenticated),
            Ok(())
        );
        assert_eq!(
            authorize(&identity(UserRole::Pilot), Requirement::Admin),
            Err(GateRejection::Forbidden)
        );
        assert_eq!(
            authorize(&identity(UserRole::Admin), Requirement::Admin),
            Ok(())
        );
    }

    #[test]
    fn test_context_from_path() {
        assert_eq!(GateContext::from_path("/api/admin/users"), GateContext::Api);
        assert_eq!(GateContext::from_path("/admin"), GateContext::Page);
        assert_eq!(GateContext::from_path("/apiary"), GateContext::Page);
    }

    #[test]
    fn test_rejection_rendering() {
        let api = GateRejection::Unauthenticated.into_response_for(GateContext::Api, "/api/x");
        assert_eq!(api.status(), StatusCode::UNAUTHORIZED);

        let api = GateRejection::Forbidden.into_response_for(GateContext::Api, "/api/x");
        assert_eq!(api.status(), StatusCode::FORBIDDEN);

        let page = GateRejection::Unauthenticated.into_response_for(GateContext::Page, "/dashboard");
        assert!(page.status().is_redirection());
        assert_eq!(
            page.headers().get("location").unwrap(),
            "/login?redirect=%2Fdashboard"
        );

        let page = GateRejection::Unauthenticated
            .into_response_for(GateContext::Page, "/dashboard?field=north&day=3");
        assert_eq!(
            page.headers().get("location").unwrap(),
            "/login?redirect=%2Fdashboard%3Ffield%3Dnorth%26day%3D3"
        );

        let page = GateRejection::Forbidden.into_response_for(GateContext::Page, "/admin");
        assert_eq!(page.headers().get("location").unwrap(), "/unauthorized");
    }
}
