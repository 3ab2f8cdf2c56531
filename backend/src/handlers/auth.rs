//! Authentication HTTP handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;

use super::{ApiJson, AuthenticatedUser, CurrentIdentity};
use crate::auth::{cookies, AuthError, TokenPair};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ApiResponse, AuthUserResponse, ChangePasswordRequest, LoginRequest, MeResponse,
    RegisterRequest, User,
};
use crate::state::AppState;

/// Token cookies, plus a legacy session when legacy auth is on
async fn attach_session(state: &AppState, jar: CookieJar, user: &User, tokens: &TokenPair) -> CookieJar {
    let jar = state.cookies.set_auth_cookies(jar, tokens);
    if !state.legacy_auth_enabled {
        return jar;
    }

    let session = state.sessions.create(user).await;
    state
        .cookies
        .set_legacy_session(jar, &session.token, state.sessions.ttl_seconds())
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<AuthUserResponse>)> {
    let (user, tokens) = state.auth_service.login(&req.email, &req.password).await?;
    let jar = attach_session(&state, jar, &user, &tokens).await;

    Ok((jar, Json(AuthUserResponse::new(user))))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, CookieJar, Json<AuthUserResponse>)> {
    let (user, tokens) = state.auth_service.register(req).await?;
    let jar = attach_session(&state, jar, &user, &tokens).await;

    Ok((StatusCode::CREATED, jar, Json(AuthUserResponse::new(user))))
}

/// POST /api/auth/refresh
///
/// On failure the stale cookies are cleared along with the 401.
pub async fn refresh_token(State(state): State<AppState>, jar: CookieJar) -> Response {
    let presented = cookies::refresh_token(&jar);

    match state.auth_service.refresh(presented.as_deref()).await {
        Ok((user, tokens)) => {
            let jar = state.cookies.set_auth_cookies(jar, &tokens);
            (jar, Json(AuthUserResponse::new(user))).into_response()
        }
        Err(e) => {
            let jar = state.cookies.clear_auth_cookies(jar);
            (jar, ApiError::from(e)).into_response()
        }
    }
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiResponse>) {
    if let Some(token) = cookies::legacy_session(&jar) {
        state.sessions.remove(&token).await;
    }

    let jar = state.cookies.clear_auth_cookies(jar);
    (jar, Json(ApiResponse::message("已退出登录")))
}

/// GET /api/auth/me
///
/// Always 200; `success: false` when nobody is signed in.
pub async fn get_current_user(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> ApiResult<Json<MeResponse>> {
    let unauthenticated = || MeResponse {
        success: false,
        user: None,
        source: None,
        message: Some(AuthError::NotAuthenticated.to_string()),
    };

    let Some(user_id) = identity.user_id else {
        return Ok(Json(unauthenticated()));
    };

    let user = match state.auth_service.store().get_user_by_id(user_id).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = %e, user_id, "Failed to load current user");
            None
        }
    };

    Ok(Json(match user {
        Some(user) => MeResponse {
            success: true,
            user: Some(user.into()),
            source: Some(identity.source.as_str()),
            message: None,
        },
        None => unauthenticated(),
    }))
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<ApiResponse>> {
    state
        .auth_service
        .change_password(user.user_id(), req)
        .await?;

    // legacy sessions do not re-check credentials, so drop them
    state.sessions.remove_user(user.user_id()).await;

    Ok(Json(ApiResponse::message("密码修改成功")))
}
