//! Audit trail for security-sensitive operations
//!
//! Each record is persisted to `audit_events` and mirrored as a `tracing`
//! event on the `audit` target.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::AuditEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: &'static str,
    pub actor_email: Option<String>,
    pub target_email: Option<String>,
    pub outcome: AuditOutcome,
    pub reason: Option<String>,
    pub client_ip: Option<String>,
}

impl AuditRecord {
    pub fn new(action: &'static str, outcome: AuditOutcome) -> Self {
        Self {
            action,
            actor_email: None,
            target_email: None,
            outcome,
            reason: None,
            client_ip: None,
        }
    }

    pub fn actor(mut self, email: impl Into<String>) -> Self {
        self.actor_email = Some(email.into());
        self
    }

    pub fn target(mut self, email: impl Into<String>) -> Self {
        self.target_email = Some(email.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn client_ip(mut self, ip: Option<String>) -> Self {
        self.client_ip = ip;
        self
    }
}

pub const MAX_AUDIT_PAGE: i64 = 500;

#[derive(Clone)]
pub struct AuditLog {
    pool: SqlitePool,
}

impl AuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist and log `record`. A failed insert is logged and swallowed so
    /// the audited request still gets its own outcome.
    pub async fn record(&self, record: AuditRecord) {
        match record.outcome {
            AuditOutcome::Success => tracing::info!(
                target: "audit",
                action = record.action,
                actor = ?record.actor_email,
                target_email = ?record.target_email,
                client_ip = ?record.client_ip,
                outcome = record.outcome.as_str(),
                reason = ?record.reason,
                "Audit event"
            ),
            AuditOutcome::Failure => tracing::warn!(
                target: "audit",
                action = record.action,
                actor = ?record.actor_email,
                target_email = ?record.target_email,
                client_ip = ?record.client_ip,
                outcome = record.outcome.as_str(),
                reason = ?record.reason,
                "Audit event"
            ),
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO audit_events (action, actor_email, target_email, outcome, reason, client_ip, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.action)
        .bind(&record.actor_email)
        .bind(&record.target_email)
        .bind(record.outcome.as_str())
        .bind(&record.reason)
        .bind(&record.client_ip)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            tracing::error!(error = %e, action = record.action, "Failed to persist audit event");
        }
    }

    /// Newest events first
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let limit = limit.clamp(1, MAX_AUDIT_PAGE);
        sqlx::query_as::<_, AuditEvent>(
            r#"
            SELECT id, action, actor_email, target_email, outcome, reason, client_ip, created_at
            FROM audit_events
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
