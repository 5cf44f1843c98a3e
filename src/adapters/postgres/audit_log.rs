//! PostgreSQL audit log and reminder outbox.
//!
//! Both tables are append-only. Reminders are written to `reminder_outbox`
//! and delivered by the notification service, which marks `dispatched_at`.

use crate::domain::billing::AuditEvent;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{AuditLog, PaymentReminder, ReminderNotifier};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

/// Appends audit events to `billing_audit_events`.
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn record(&self, event: &AuditEvent) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO billing_audit_events (
                account_id, workspace_id, event_type, payload, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*event.account_id().as_uuid())
        .bind(event.workspace_id().map(|w| *w.as_uuid()))
        .bind(event.event_type())
        .bind(Json(event))
        .bind(*event.occurred_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to record audit event: {}", e),
            )
        })?;

        Ok(())
    }
}

/// Queues payment reminders in `reminder_outbox`.
pub struct PostgresReminderOutbox {
    pool: PgPool,
}

impl PostgresReminderOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderNotifier for PostgresReminderOutbox {
    async fn send_reminder(&self, reminder: &PaymentReminder) -> Result<(), DomainError> {
        sqlx::query("INSERT INTO reminder_outbox (account_id, payload) VALUES ($1, $2)")
            .bind(reminder.account_id.as_uuid())
            .bind(Json(reminder))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to queue reminder: {}", e),
                )
            })?;

        Ok(())
    }
}
