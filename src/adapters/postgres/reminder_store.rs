//! PostgreSQL implementation of ReminderStore.
//!
//! The `(account_id, day)` primary key makes `try_claim` an atomic
//! insert-if-absent.

use crate::domain::foundation::{AccountId, DomainError, ErrorCode, Timestamp};
use crate::domain::reminder::ReminderRecord;
use crate::ports::ReminderStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PostgresReminderStore {
    pool: PgPool,
}

impl PostgresReminderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReminderRow {
    account_id: Uuid,
    day: NaiveDate,
    sent_at: DateTime<Utc>,
}

impl From<ReminderRow> for ReminderRecord {
    fn from(row: ReminderRow) -> Self {
        ReminderRecord {
            account_id: AccountId::from_uuid(row.account_id),
            day: row.day,
            sent_at: Timestamp::from_datetime(row.sent_at),
        }
    }
}

#[async_trait]
impl ReminderStore for PostgresReminderStore {
    async fn try_claim(&self, record: &ReminderRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_reminders (account_id, day, sent_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id, day) DO NOTHING
            "#,
        )
        .bind(record.account_id.as_uuid())
        .bind(record.day)
        .bind(record.sent_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to claim reminder: {}", e))
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, account_id: &AccountId, day: NaiveDate) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM payment_reminders WHERE account_id = $1 AND day = $2")
            .bind(account_id.as_uuid())
            .bind(day)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to release reminder: {}", e),
                )
            })?;
        Ok(())
    }

    async fn last_sent(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<ReminderRecord>, DomainError> {
        let row: Option<ReminderRow> = sqlx::query_as(
            r#"
            SELECT account_id, day, sent_at FROM payment_reminders
            WHERE account_id = $1
            ORDER BY day DESC
            LIMIT 1
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to fetch reminder: {}", e))
        })?;

        Ok(row.map(ReminderRecord::from))
    }
}
