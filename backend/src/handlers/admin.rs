//! Admin HTTP handlers
//!
//! Bootstrap is open to anonymous callers; it only succeeds while no admin
//! exists. Everything else requires the admin role.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{AdminUser, ApiJson};
use crate::auth::{normalize_email, AuthError};
use crate::error::{ApiError, ApiResult};
use crate::middleware::ClientIp;
use crate::models::{
    AuditListResponse, AuditQuery, AuthUserResponse, BootstrapRequest, UpdateRoleRequest,
    UserListResponse, UserResponse, UserRole,
};
use crate::services::{AuditOutcome, AuditRecord};
use crate::state::AppState;

pub const DEFAULT_AUDIT_PAGE: i64 = 50;

/// POST /api/admin/bootstrap
///
/// Every attempt lands in the audit log, malformed bodies included.
pub async fn bootstrap_admin(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<ApiJson<BootstrapRequest>, ApiError>,
) -> ApiResult<Json<AuthUserResponse>> {
    let req = match payload {
        Ok(ApiJson(req)) => req,
        Err(e) => {
            state
                .audit_log
                .record(
                    AuditRecord::new("admin_bootstrap", AuditOutcome::Failure)
                        .reason(e.to_string())
                        .client_ip(ip),
                )
                .await;
            return Err(e);
        }
    };

    match state.auth_service.bootstrap_admin(&req.email).await {
        Ok(user) => {
            state
                .audit_log
                .record(
                    AuditRecord::new("admin_bootstrap", AuditOutcome::Success)
                        .target(user.email.clone())
                        .client_ip(ip),
                )
                .await;
            state.sessions.remove_user(user.id).await;

            Ok(Json(AuthUserResponse::new(user)))
        }
        Err(e) => {
            let mut record = AuditRecord::new("admin_bootstrap", AuditOutcome::Failure)
                .reason(e.to_string())
                .client_ip(ip);
            let email = normalize_email(&req.email);
            if !email.is_empty() {
                record = record.target(email);
            }
            state.audit_log.record(record).await;

            Err(e.into())
        }
    }
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<UserListResponse>> {
    let users = state.auth_service.store().list_users().await?;

    Ok(Json(UserListResponse {
        success: true,
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

/// PUT /api/admin/users/:id/role
pub async fn update_user_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    Path(user_id): Path<i64>,
    ApiJson(req): ApiJson<UpdateRoleRequest>,
) -> ApiResult<Json<AuthUserResponse>> {
    let role: UserRole = req
        .role
        .parse()
        .map_err(|_| AuthError::InvalidRole(req.role.clone()))?;

    let mut record = AuditRecord::new("role_change", AuditOutcome::Success).client_ip(ip);
    if let Some(email) = &admin.email {
        record = record.actor(email.clone());
    }

    match state.auth_service.store().update_role(user_id, role).await {
        Ok(user) => {
            // legacy sessions snapshot the old role
            state.sessions.remove_user(user.id).await;
            state
                .audit_log
                .record(record.target(user.email.clone()).reason(format!("role={}", role)))
                .await;

            Ok(Json(AuthUserResponse::new(user)))
        }
        Err(e) => {
            record.outcome = AuditOutcome::Failure;
            state
                .audit_log
                .record(record.reason(format!("user_id={} role={}: {}", user_id, role, e)))
                .await;

            Err(e.into())
        }
    }
}

/// GET /api/admin/audit?limit=
pub async fn audit_events(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<AuditListResponse>> {
    let events = state
        .audit_log
        .recent(query.limit.unwrap_or(DEFAULT_AUDIT_PAGE))
        .await?;

    Ok(Json(AuditListResponse {
        success: true,
        events,
    }))
}
