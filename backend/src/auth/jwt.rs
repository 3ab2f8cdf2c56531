//! JWT token generation and validation
//!
//! Handles creation and verification of access and refresh tokens. Both
//! kinds are signed with the same HS256 secret and told apart by the
//! `type` claim, which every caller must check before trusting a token.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{User, UserRole};

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Token type carried in the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims shared by access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user ID as a string)
    pub sub: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// JWT ID
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Identity a token pair is bound to
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
}

impl From<&User> for TokenSubject {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Freshly minted access + refresh tokens
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub access_expires_in: i64,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: i64,
}

/// Signs and verifies tokens with a shared secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenIssuer {
    /// # Arguments
    /// * `secret` - HS256 signing secret
    /// * `access_ttl_seconds` - Access token time-to-live in seconds
    /// * `refresh_ttl_days` - Refresh token time-to-live in days
    pub fn new(secret: &str, access_ttl_seconds: i64, refresh_ttl_days: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl_seconds,
            refresh_ttl_seconds: refresh_ttl_days * 24 * 60 * 60,
        }
    }

    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    /// Mint a signed access + refresh token pair for `subject`
    pub fn generate_token_pair(&self, subject: &TokenSubject) -> Result<TokenPair, JwtError> {
        let access_token = self.generate_token(subject, TokenType::Access)?;
        let refresh_token = self.generate_token(subject, TokenType::Refresh)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_in: self.access_ttl_seconds,
            refresh_expires_in: self.refresh_ttl_seconds,
        })
    }

    fn generate_token(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
    ) -> Result<String, JwtError> {
        let ttl_seconds = match token_type {
            TokenType::Access => self.access_ttl_seconds,
            TokenType::Refresh => self.refresh_ttl_seconds,
        };

        let now = Utc::now();
        let exp = now + Duration::seconds(ttl_seconds);

        let claims = Claims {
            sub: subject.user_id.to_string(),
            user_id: subject.user_id,
            email: subject.email.clone(),
            role: subject.role,
            token_type,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Verify signature and expiry and decode the claims
    ///
    /// # Returns
    /// * `Ok(Claims)` if token is valid
    /// * `Err(JwtError)` if validation fails
    pub fn verify_token(&self, token: &str) -> Result<Claims, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                ErrorKind::InvalidSignature => JwtError::InvalidToken("bad signature".to_string()),
                _ => JwtError::DecodingFailed(e.to_string()),
            },
        )?;

        let claims = token_data.claims;
        if claims.sub != claims.user_id.to_string() {
            return Err(JwtError::InvalidToken("subject mismatch".to_string()));
        }

        Ok(claims)
    }

    /// Like [`verify_token`](Self::verify_token), collapsing every failure
    /// into `None`.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        match self.verify_token(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(error = %e, "Token rejected");
                None
            }
        }
    }

    /// Verified claims, only if the token is an access token
    pub fn verify_access(&self, token: &str) -> Option<Claims> {
        self.verify_typed(token, TokenType::Access)
    }

    /// Verified claims, only if the token is a refresh token
    pub fn verify_refresh(&self, token: &str) -> Option<Claims> {
        self.verify_typed(token, TokenType::Refresh)
    }

    fn verify_typed(&self, token: &str, expected: TokenType) -> Option<Claims> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            tracing::debug!(
                expected = expected.as_str(),
                actual = claims.token_type.as_str(),
                "Token type mismatch"
            );
            return None;
        }
        Some(claims)
    }
}
