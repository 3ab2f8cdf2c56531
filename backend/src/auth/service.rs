//! Authentication service
//!
//! Login, registration, token refresh, password change and admin bootstrap
//! on top of the credential store and the token issuer.

use thiserror::Error;
use tokio::sync::OnceCell;
use validator::Validate;

use crate::error::first_validation_message;
use crate::models::{ChangePasswordRequest, RegisterRequest, User, UserRole};

use super::jwt::{JwtError, TokenIssuer, TokenPair, TokenSubject};
use super::password::{hash_password, verify_password};
use super::store::{normalize_email, CredentialStore, NewUser};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("请填写所有必填字段")]
    MissingFields,

    #[error("{0}")]
    Validation(String),

    #[error("Unknown role: {0}")]
    InvalidRole(String),

    /// Deliberately identical for unknown email and wrong password
    #[error("邮箱或密码错误")]
    InvalidCredentials,

    #[error("用户名或邮箱已存在")]
    UserExists,

    #[error("用户不存在")]
    UserNotFound,

    #[error("未登录")]
    NotAuthenticated,

    #[error("Admin access required")]
    AdminRequired,

    #[error("缺少刷新令牌")]
    MissingRefreshToken,

    #[error("刷新令牌无效或已过期")]
    InvalidRefreshToken,

    #[error("原密码错误")]
    WrongPassword,

    #[error("Admin already exists")]
    AdminExists,

    #[error("Cannot remove the last admin")]
    LastAdmin,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token error: {0}")]
    Token(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Database(e.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::Token(e.to_string())
    }
}

/// Authentication service
pub struct AuthService {
    store: CredentialStore,
    tokens: TokenIssuer,
    /// Hash checked against when the email is unknown, so both failure
    /// paths cost one bcrypt verification.
    dummy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(store: CredentialStore, tokens: TokenIssuer) -> Self {
        Self {
            store,
            tokens,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn issue_tokens(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(self.tokens.generate_token_pair(&TokenSubject::from(user))?)
    }

    /// Validate credentials and mint a token pair
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let user = match self.store.get_user_by_email(email).await? {
            Some(user) => user,
            None => {
                let dummy = self
                    .dummy_hash
                    .get_or_try_init(|| hash_password("canopy-dummy-password", self.store.bcrypt_cost()))
                    .await?;
                verify_password(password, dummy).await?;
                tracing::info!(email = %normalize_email(email), "Login failed: unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.store.verify_password(password, &user.password_hash).await? {
            tracing::info!(user_id = user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(&user)?;
        tracing::info!(user_id = user.id, role = %user.role, "User logged in");

        Ok((user, tokens))
    }

    /// Create an account (first one becomes admin) and mint a token pair
    pub async fn register(&self, req: RegisterRequest) -> Result<(User, TokenPair), AuthError> {
        if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty()
        {
            return Err(AuthError::MissingFields);
        }

        let req = RegisterRequest {
            username: req.username.trim().to_string(),
            email: normalize_email(&req.email),
            ..req
        };
        req.validate()
            .map_err(|e| AuthError::Validation(first_validation_message(&e)))?;

        let user = self
            .store
            .register_user(NewUser {
                username: req.username,
                email: req.email,
                password: req.password,
                name: req.name,
                role: UserRole::User,
            })
            .await?;

        let tokens = self.issue_tokens(&user)?;
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new pair
    ///
    /// The token must verify, carry `type = refresh`, and name a user that
    /// still exists. The new pair reflects the user's current role.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<(User, TokenPair), AuthError> {
        let refresh_token = refresh_token.ok_or(AuthError::MissingRefreshToken)?;

        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .ok_or(AuthError::InvalidRefreshToken)?;

        let user = match self.store.get_user_by_id(claims.user_id).await? {
            Some(user) => user,
            None => {
                tracing::warn!(user_id = claims.user_id, "Refresh token for unknown user");
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        let tokens = self.issue_tokens(&user)?;
        tracing::debug!(user_id = user.id, "Token pair refreshed");

        Ok((user, tokens))
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        req: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        if req.old_password.is_empty() || req.new_password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        req.validate()
            .map_err(|e| AuthError::Validation(first_validation_message(&e)))?;

        self.store
            .change_password(user_id, &req.old_password, &req.new_password)
            .await
    }

    /// Promote an existing account to the first admin
    pub async fn bootstrap_admin(&self, email: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }
        if !validator::validate_email(&email) {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }

        self.store.promote_first_admin(&email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenType;
    use crate::config::Config;
    use crate::db;

    async fn service() -> AuthService {
        let pool = db::create_pool(&Config::for_tests()).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        AuthService::new(
            CredentialStore::new(pool, 4),
            TokenIssuer::new("test-secret-key", 900, 7),
        )
    }

    fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            name: String::new(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service().await;
        let (user, tokens) = service
            .register(register_request("pilot", "Pilot@Example.com", "secret123"))
            .await
            .unwrap();
        assert_eq!(user.email, "pilot@example.com");

        let claims = service.tokens().verify_access(&tokens.access_token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.role, UserRole::Admin);

        let (logged_in, _) = service
            .login("PILOT@example.com", "secret123")
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let service = service().await;
        service
            .register(register_request("pilot", "pilot@example.com", "secret123"))
            .await
            .unwrap();

        let wrong_password = service
            .login("pilot@example.com", "wrong-password")
            .await
            .unwrap_err();
        let unknown_email = service
            .login("ghost@example.com", "secret123")
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.to_string(), "邮箱或密码错误");
    }

    #[tokio::test]
    async fn test_login_missing_fields() {
        let service = service().await;
        assert!(matches!(
            service.login("", "secret123").await,
            Err(AuthError::MissingFields)
        ));
        assert!(matches!(
            service.login("pilot@example.com", "").await,
            Err(AuthError::MissingFields)
        ));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = service().await;

        let short = service
            .register(register_request("pilot", "pilot@example.com", "12345"))
            .await;
        assert!(matches!(short, Err(AuthError::Validation(m)) if m == "密码长度至少为6位"));

        let bad_email = service
            .register(register_request("pilot", "pilot-at-example", "123456"))
            .await;
        assert!(matches!(bad_email, Err(AuthError::Validation(m)) if m == "邮箱格式不正确"));

        let missing = service
            .register(register_request("", "pilot@example.com", "123456"))
            .await;
        assert!(matches!(missing, Err(AuthError::MissingFields)));
    }

    #[tokio::test]
    async fn test_refresh_requires_refresh_token() {
        let service = service().await;
        let (user, tokens) = service
            .register(register_request("pilot", "pilot@example.com", "secret123"))
            .await
            .unwrap();

        assert!(matches!(
            service.refresh(None).await,
            Err(AuthError::MissingRefreshToken)
        ));
        assert!(matches!(
            service.refresh(Some(&tokens.access_token)).await,
            Err(AuthError::InvalidRefreshToken)
        ));

        let (refreshed_user, pair) = service.refresh(Some(&tokens.refresh_token)).await.unwrap();
        assert_eq!(refreshed_user.id, user.id);
        let claims = service.tokens().verify_token(&pair.access_token).unwrap();
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[tokio::test]
    async fn test_refresh_for_deleted_user_fails() {
        let service = service().await;
        let (user, tokens) = service
            .register(register_request("pilot", "pilot@example.com", "secret123"))
            .await
            .unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user.id)
            .execute(service.store().pool())
            .await
            .unwrap();

        assert!(matches!(
            service.refresh(Some(&tokens.refresh_token)).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_validation() {
        let service = service().await;
        assert!(matches!(
            service.bootstrap_admin("  ").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            service.bootstrap_admin("not-an-email").await,
            Err(AuthError::Validation(_))
        ));
    }
}
