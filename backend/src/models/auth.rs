//! Authentication request/response models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use validator::Validate;

use super::UserRole;

/// User response (sanitized for API)
#[derive(Debug, Serialize, Clone)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Audit trail entry for security-sensitive operations
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct AuditEvent {
    pub id: i64,
    pub action: String,
    pub actor_email: Option<String>,
    pub target_email: Option<String>,
    pub outcome: String,
    pub reason: Option<String>,
    pub client_ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 2, max = 32, message = "用户名长度需在2到32个字符之间"))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "邮箱格式不正确"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "密码长度至少为6位"))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 64, message = "姓名过长"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "密码长度至少为6位"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct BootstrapRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// `{success, user}` body returned by login, register, refresh and bootstrap
#[derive(Debug, Serialize)]
pub struct AuthUserResponse {
    pub success: bool,
    pub user: UserResponse,
}

impl AuthUserResponse {
    pub fn new(user: impl Into<UserResponse>) -> Self {
        Self {
            success: true,
            user: user.into(),
        }
    }
}

/// Body of `GET /api/auth/me`
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    /// Where the identity came from (`jwt`, `legacy_email`, `legacy_session`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub success: bool,
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Serialize)]
pub struct AuditListResponse {
    pub success: bool,
    pub events: Vec<AuditEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_rejects_short_password() {
        let req = RegisterRequest {
            username: "pilot1".to_string(),
            email: "pilot@example.com".to_string(),
            password: "12345".to_string(),
            name: String::new(),
        };

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_register_request_rejects_bad_email() {
        let req = RegisterRequest {
            username: "pilot1".to_string(),
            email: "not-an-email".to_string(),
            password: "123456".to_string(),
            name: String::new(),
        };

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_change_password_request_uses_camel_case() {
        let req: ChangePasswordRequest =
            serde_json::from_str(r#"{"oldPassword":"abcdef","newPassword":"ghijkl"}"#).unwrap();
        assert_eq!(req.old_password, "abcdef");
        assert!(req.validate().is_ok());
    }
}
