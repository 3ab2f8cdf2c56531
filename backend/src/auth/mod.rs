//! Authentication module for Canopy
//!
//! - Credential store over SQLite with bcrypt password hashes
//! - Access/refresh JWT pairs, distinguished by the `type` claim
//! - HTTP-only session cookies plus the legacy cookie/session fallback

pub mod cookies;
mod jwt;
mod password;
mod service;
mod session;
mod store;

pub use cookies::CookieManager;
pub use jwt::{Claims, JwtError, TokenIssuer, TokenPair, TokenSubject, TokenType};
pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use service::{AuthError, AuthService};
pub use session::{LegacySession, SessionStore};
pub use store::{normalize_email, CredentialStore, NewUser};
