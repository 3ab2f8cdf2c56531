//! In-memory legacy session table
//!
//! Opaque random tokens mapped to a user snapshot, for clients that predate
//! JWT cookies. Nothing here survives a restart.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{User, UserRole};

#[derive(Debug, Clone)]
pub struct LegacySession {
    pub token: String,
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LegacySession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, LegacySession>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub async fn create(&self, user: &User) -> LegacySession {
        let now = Utc::now();
        let session = LegacySession {
            token: generate_session_token(),
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());

        tracing::debug!(user_id = user.id, "Legacy session created");

        session
    }

    /// Live session for `token`. Expired entries are evicted on sight.
    pub async fn get(&self, token: &str) -> Option<LegacySession> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                None => return None,
                Some(session) if !session.is_expired(now) => return Some(session.clone()),
                Some(_) => {}
            }
        }

        self.sessions.write().await.remove(token);
        None
    }

    pub async fn remove(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Drop every session belonging to `user_id`
    pub async fn remove_user(&self, user_id: i64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        before - sessions.len()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// 32 random bytes, hex encoded
fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
