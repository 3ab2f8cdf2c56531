//! Password hashing
//!
//! bcrypt is CPU-bound, so both directions run on the blocking pool.

use super::AuthError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password with a fresh salt
pub async fn hash_password(plain: &str, cost: u32) -> Result<String, AuthError> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check `plain` against a stored bcrypt hash
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(plain: &str, hash: &str) -> Result<bool, AuthError> {
    let plain = plain.to_owned();
    let hash = hash.to_owned();
    let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?;

    match outcome {
        Ok(valid) => Ok(valid),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be parsed");
            Ok(false)
        }
    }
}

pub fn check_password_strength(plain: &str) -> Result<(), AuthError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation("密码长度至少为6位".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("hunter22", 4).await.unwrap();
        assert_ne!(hash, "hunter22");
        assert!(hash.starts_with("$2"));

        assert!(verify_password("hunter22", &hash).await.unwrap());
        assert!(!verify_password("hunter23", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_are_salted() {
        let a = hash_password("same-password", 4).await.unwrap();
        let b = hash_password("same-password", 4).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash").await.unwrap());
    }

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("12345").is_err());
        assert!(check_password_strength("123456").is_ok());
        // counted in characters, not bytes
        assert!(check_password_strength("密码密码").is_err());
    }
}
