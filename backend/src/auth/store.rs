//! Credential store
//!
//! User records in SQLite. Emails are normalized (trimmed, lowercased) on
//! every write and lookup; passwords only ever land here as bcrypt hashes.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{User, UserRole};

use super::password::{check_password_strength, hash_password, verify_password};
use super::AuthError;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, name, role, created_at, updated_at";

/// Input for [`CredentialStore::create_user`]
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: UserRole,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
    bcrypt_cost: u32,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Insert a user with an explicit role
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        let role = new_user.role;
        self.insert_user(new_user, Some(role)).await
    }

    /// Insert a self-registered user. The very first account becomes
    /// `admin`, every later one `user`; the check and the insert are a
    /// single statement.
    pub async fn register_user(&self, new_user: NewUser) -> Result<User, AuthError> {
        self.insert_user(new_user, None).await
    }

    async fn insert_user(
        &self,
        new_user: NewUser,
        role: Option<UserRole>,
    ) -> Result<User, AuthError> {
        check_password_strength(&new_user.password)?;

        let email = normalize_email(&new_user.email);
        let username = new_user.username.trim().to_string();
        let name = match new_user.name.trim() {
            "" => username.clone(),
            name => name.to_string(),
        };

        let password_hash = hash_password(&new_user.password, self.bcrypt_cost).await?;
        let now = Utc::now();

        let inserted = match role {
            Some(role) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO users (username, email, password_hash, name, role, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    RETURNING id
                    "#,
                )
                .bind(&username)
                .bind(&email)
                .bind(&password_hash)
                .bind(&name)
                .bind(role)
                .bind(now)
                .bind(now)
                .fetch_one(&self.pool)
                .await
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO users (username, email, password_hash, name, role, created_at, updated_at)
                    SELECT ?, ?, ?, ?,
                           CASE WHEN EXISTS (SELECT 1 FROM users) THEN 'user' ELSE 'admin' END,
                           ?, ?
                    RETURNING id
                    "#,
                )
                .bind(&username)
                .bind(&email)
                .bind(&password_hash)
                .bind(&name)
                .bind(now)
                .bind(now)
                .fetch_one(&self.pool)
                .await
            }
        };

        let user_id = match inserted {
            Ok(id) => id,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(AuthError::UserExists)
            }
            Err(e) => return Err(e.into()),
        };

        let user = self
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(
            user_id = user.id,
            username = %user.username,
            role = %user.role,
            "User created"
        );

        Ok(user)
    }

    /// Check `plain` against a stored hash
    pub async fn verify_password(&self, plain: &str, hash: &str) -> Result<bool, AuthError> {
        verify_password(plain, hash).await
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(old_password, &user.password_hash).await? {
            return Err(AuthError::WrongPassword);
        }

        check_password_strength(new_password)?;
        let password_hash = hash_password(new_password, self.bcrypt_cost).await?;

        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(&password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(user_id, "Password changed");

        Ok(())
    }

    pub async fn has_admin(&self) -> Result<bool, AuthError> {
        let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&self.pool)
            .await?;
        Ok(admins > 0)
    }

    pub async fn count_users(&self) -> Result<i64, AuthError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Promote the user owning `email` to admin, only while no admin exists
    pub async fn promote_first_admin(&self, email: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);

        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET role = 'admin', updated_at = ?
            WHERE email = ?
              AND NOT EXISTS (SELECT 1 FROM users WHERE role = 'admin')
            "#,
        )
        .bind(Utc::now())
        .bind(&email)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            if self.has_admin().await? {
                return Err(AuthError::AdminExists);
            }
            return Err(AuthError::UserNotFound);
        }

        self.get_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY id ASC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Change a user's role. Demoting the last remaining admin is refused.
    pub async fn update_role(&self, user_id: i64, role: UserRole) -> Result<User, AuthError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET role = ?1, updated_at = ?2
            WHERE id = ?3
              AND (role != 'admin'
                   OR ?1 = 'admin'
                   OR (SELECT COUNT(*) FROM users WHERE role = 'admin') > 1)
            "#,
        )
        .bind(role)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let user = self
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if rows_affected == 0 {
            return Err(AuthError::LastAdmin);
        }

        tracing::info!(user_id, role = %role, "User role updated");

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;

    async fn store() -> CredentialStore {
        let pool = db::create_pool(&Config::for_tests()).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        CredentialStore::new(pool, 4)
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            name: String::new(),
            role: UserRole::User,
        }
    }

    #[tokio::test]
    async fn test_first_registrant_becomes_admin() {
        let store = store().await;
        assert!(!store.has_admin().await.unwrap());

        let first = store
            .register_user(new_user("first", "first@example.com"))
            .await
            .unwrap();
        let second = store
            .register_user(new_user("second", "second@example.com"))
            .await
            .unwrap();
        let third = store
            .register_user(new_user("third", "third@example.com"))
            .await
            .unwrap();

        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(second.role, UserRole::User);
        assert_eq!(third.role, UserRole::User);
        assert!(store.has_admin().await.unwrap());
    }

    #[tokio::test]
    async fn test_email_is_normalized() {
        let store = store().await;
        let user = store
            .create_user(new_user("pilot", "  Pilot@Example.COM "))
            .await
            .unwrap();
        assert_eq!(user.email, "pilot@example.com");
        assert_eq!(user.name, "pilot");

        let found = store.get_user_by_email("PILOT@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_duplicates_conflict() {
        let store = store().await;
        store
            .create_user(new_user("pilot", "pilot@example.com"))
            .await
            .unwrap();

        let same_email = store
            .create_user(new_user("other", "PILOT@example.com"))
            .await;
        assert!(matches!(same_email, Err(AuthError::UserExists)));

        let same_username = store
            .create_user(new_user("Pilot", "other@example.com"))
            .await;
        assert!(matches!(same_username, Err(AuthError::UserExists)));
    }

    #[tokio::test]
    async fn test_password_stored_as_hash() {
        let store = store().await;
        let user = store
            .create_user(new_user("pilot", "pilot@example.com"))
            .await
            .unwrap();

        assert_ne!(user.password_hash, "secret123");
        assert!(store
            .verify_password("secret123", &user.password_hash)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let store = store().await;
        let mut input = new_user("pilot", "pilot@example.com");
        input.password = "12345".to_string();

        assert!(matches!(
            store.create_user(input).await,
            Err(AuthError::Validation(_))
        ));
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_change_password() {
        let store = store().await;
        let user = store
            .create_user(new_user("pilot", "pilot@example.com"))
            .await
            .unwrap();

        let wrong = store.change_password(user.id, "nope", "newsecret").await;
        assert!(matches!(wrong, Err(AuthError::WrongPassword)));

        let short = store.change_password(user.id, "secret123", "abc").await;
        assert!(matches!(short, Err(AuthError::Validation(_))));

        store
            .change_password(user.id, "secret123", "newsecret")
            .await
            .unwrap();

        let reloaded = store.get_user_by_id(user.id).await.unwrap().unwrap();
        assert!(store
            .verify_password("newsecret", &reloaded.password_hash)
            .await
            .unwrap());
        assert!(!store
            .verify_password("secret123", &reloaded.password_hash)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_promote_first_admin_once() {
        let store = store().await;
        store
            .create_user(new_user("a", "a@example.com"))
            .await
            .unwrap();
        store
            .create_user(new_user("b", "b@example.com"))
            .await
            .unwrap();

        let missing = store.promote_first_admin("ghost@example.com").await;
        assert!(matches!(missing, Err(AuthError::UserNotFound)));

        let admin = store.promote_first_admin("A@example.com").await.unwrap();
        assert_eq!(admin.role, UserRole::Admin);

        let again = store.promote_first_admin("b@example.com").await;
        assert!(matches!(again, Err(AuthError::AdminExists)));
    }

    #[tokio::test]
    async fn test_last_admin_cannot_be_demoted() {
        let store = store().await;
        let admin = store
            .register_user(new_user("root", "root@example.com"))
            .await
            .unwrap();
        let pilot = store
            .register_user(new_user("pilot", "pilot@example.com"))
            .await
            .unwrap();

        let demote = store.update_role(admin.id, UserRole::User).await;
        assert!(matches!(demote, Err(AuthError::LastAdmin)));

        let promoted = store.update_role(pilot.id, UserRole::Admin).await.unwrap();
        assert_eq!(promoted.role, UserRole::Admin);

        let demoted = store.update_role(admin.id, UserRole::Pilot).await.unwrap();
        assert_eq!(demoted.role, UserRole::Pilot);

        let missing = store.update_role(9999, UserRole::User).await;
        assert!(matches!(missing, Err(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_list_users_in_creation_order() {
        let store = store().await;
        for (name, email) in [("a", "a@example.com"), ("b", "b@example.com")] {
            store.create_user(new_user(name, email)).await.unwrap();
        }

        let users = store.list_users().await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
