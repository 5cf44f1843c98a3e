//! PostgreSQL implementation of BillingLedger.
//!
//! Two partial unique indexes back the ledger rules:
//! `charge_attempts_open_period_key` rejects a second pending or succeeded
//! attempt for the same account and period, and
//! `charge_attempts_one_pending_key` rejects a second pending attempt for the
//! same account. The adapter reports either as `LedgerConflict`.

use crate::domain::billing::{
    AttemptStatus, BillingPeriod, ChargeAttempt, ChargeKind, LineItem,
};
use crate::domain::foundation::{AccountId, AttemptId, DomainError, ErrorCode, Timestamp};
use crate::ports::BillingLedger;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

const OPEN_PERIOD_CONSTRAINT: &str = "charge_attempts_open_period_key";
const ONE_PENDING_CONSTRAINT: &str = "charge_attempts_one_pending_key";

/// PostgreSQL implementation of the BillingLedger port.
pub struct PostgresBillingLedger {
    pool: PgPool,
}

impl PostgresBillingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn settle(
        &self,
        id: &AttemptId,
        status: AttemptStatus,
        processor_reference: Option<&str>,
        failure_reason: Option<&str>,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE charge_attempts SET
                status = $2,
                processor_reference = COALESCE($3, processor_reference),
                failure_reason = COALESCE($4, failure_reason),
                settled_at = $5
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(processor_reference)
        .bind(failure_reason)
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to settle charge attempt", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Either the attempt does not exist or it is already settled.
        match self.find_by_id(id).await? {
            None => Err(DomainError::new(
                ErrorCode::AttemptNotFound,
                format!("Attempt not found: {}", id),
            )),
            Some(existing) => Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition attempt from {} to {}",
                    existing.status.as_str(),
                    status.as_str()
                ),
            )
            .with_detail("current", existing.status.as_str())),
        }
    }
}

/// Database row representation of a charge attempt.
#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    id: Uuid,
    account_id: Uuid,
    kind: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    amount_cents: i64,
    currency: String,
    line_items: Json<Vec<LineItem>>,
    description: String,
    reserved_packs: i32,
    status: String,
    processor_reference: Option<String>,
    failure_reason: Option<String>,
    failure_counted: bool,
    created_at: DateTime<Utc>,
    settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<AttemptRow> for ChargeAttempt {
    type Error = DomainError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(ChargeAttempt {
            id: AttemptId::from_uuid(row.id),
            account_id: AccountId::from_uuid(row.account_id),
            kind: parse_kind(&row.kind)?,
            period: BillingPeriod {
                start: Timestamp::from_datetime(row.period_start),
                end: Timestamp::from_datetime(row.period_end),
            },
            amount_cents: row.amount_cents,
            currency: row.currency,
            line_items: row.line_items.0,
            description: row.description,
            reserved_packs: u32::try_from(row.reserved_packs).map_err(|_| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid reserved pack count: {}", row.reserved_packs),
                )
            })?,
            status: parse_status(&row.status)?,
            processor_reference: row.processor_reference,
            failure_reason: row.failure_reason,
            failure_counted: row.failure_counted,
            created_at: Timestamp::from_datetime(row.created_at),
            settled_at: row.settled_at.map(Timestamp::from_datetime),
        })
    }
}

fn parse_kind(s: &str) -> Result<ChargeKind, DomainError> {
    match s {
        "subscription" => Ok(ChargeKind::Subscription),
        "renewal" => Ok(ChargeKind::Renewal),
        "early_payment" => Ok(ChargeKind::EarlyPayment),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid charge kind value: {}", s),
        )),
    }
}

fn parse_status(s: &str) -> Result<AttemptStatus, DomainError> {
    match s {
        "pending" => Ok(AttemptStatus::Pending),
        "succeeded" => Ok(AttemptStatus::Succeeded),
        "failed" => Ok(AttemptStatus::Failed),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid attempt status value: {}", s),
        )),
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

const SELECT_ATTEMPT: &str = r#"
    SELECT id, account_id, kind, period_start, period_end, amount_cents, currency,
           line_items, description, reserved_packs, status, processor_reference,
           failure_reason, failure_counted, created_at, settled_at
    FROM charge_attempts
"#;

#[async_trait]
impl BillingLedger for PostgresBillingLedger {
    async fn record_pending(&self, attempt: &ChargeAttempt) -> Result<AttemptId, DomainError> {
        let reserved_packs = i32::try_from(attempt.reserved_packs).map_err(|_| {
            DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Reserved pack count out of range: {}", attempt.reserved_packs),
            )
        })?;

        sqlx::query(
            r#"
            INSERT INTO charge_attempts (
                id, account_id, kind, period_start, period_end, amount_cents, currency,
                line_items, description, reserved_packs, status, failure_counted, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', FALSE, $11)
            "#,
        )
        .bind(attempt.id.as_uuid())
        .bind(attempt.account_id.as_uuid())
        .bind(attempt.kind.as_str())
        .bind(attempt.period.start.as_datetime())
        .bind(attempt.period.end.as_datetime())
        .bind(attempt.amount_cents)
        .bind(&attempt.currency)
        .bind(Json(&attempt.line_items))
        .bind(&attempt.description)
        .bind(reserved_packs)
        .bind(attempt.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                let message = match db_err.constraint() {
                    Some(OPEN_PERIOD_CONSTRAINT) => Some(format!(
                        "Period starting {} is already paid or in flight",
                        attempt.period.start.as_datetime()
                    )),
                    Some(ONE_PENDING_CONSTRAINT) => {
                        Some("Another attempt is still awaiting settlement".to_string())
                    }
                    _ => None,
                };
                if let Some(message) = message {
                    return DomainError::new(ErrorCode::LedgerConflict, message)
                        .with_detail("account_id", attempt.account_id.to_string());
                }
            }
            db_error("Failed to record charge attempt", e)
        })?;

        Ok(attempt.id)
    }

    async fn mark_succeeded(
        &self,
        id: &AttemptId,
        processor_reference: &str,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        self.settle(id, AttemptStatus::Succeeded, Some(processor_reference), None, at)
            .await
    }

    async fn mark_failed(
        &self,
        id: &AttemptId,
        reason: &str,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        self.settle(id, AttemptStatus::Failed, None, Some(reason), at).await
    }

    async fn mark_failure_counted(&self, id: &AttemptId) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE charge_attempts SET failure_counted = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to flag charge attempt", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::AttemptNotFound,
                format!("Attempt not found: {}", id),
            ));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &AttemptId) -> Result<Option<ChargeAttempt>, DomainError> {
        let row: Option<AttemptRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_ATTEMPT))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to fetch charge attempt", e))?;

        row.map(ChargeAttempt::try_from).transpose()
    }

    async fn latest_for_period(
        &self,
        account_id: &AccountId,
        period_start: Timestamp,
    ) -> Result<Option<ChargeAttempt>, DomainError> {
        let row: Option<AttemptRow> = sqlx::query_as(&format!(
            "{} WHERE account_id = $1 AND period_start = $2 ORDER BY created_at DESC LIMIT 1",
            SELECT_ATTEMPT
        ))
        .bind(account_id.as_uuid())
        .bind(period_start.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch charge attempt", e))?;

        row.map(ChargeAttempt::try_from).transpose()
    }

    async fn pending_for_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<ChargeAttempt>, DomainError> {
        let row: Option<AttemptRow> = sqlx::query_as(&format!(
            "{} WHERE account_id = $1 AND status = 'pending'",
            SELECT_ATTEMPT
        ))
        .bind(account_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch pending attempt", e))?;

        row.map(ChargeAttempt::try_from).transpose()
    }

    async fn find_unresolved(&self, cutoff: Timestamp) -> Result<Vec<ChargeAttempt>, DomainError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "{} WHERE status = 'pending' AND (failure_counted OR created_at < $1) \
             ORDER BY created_at",
            SELECT_ATTEMPT
        ))
        .bind(cutoff.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list pending attempts", e))?;

        rows.into_iter().map(ChargeAttempt::try_from).collect()
    }

    async fn history(&self, account_id: &AccountId) -> Result<Vec<ChargeAttempt>, DomainError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "{} WHERE account_id = $1 ORDER BY created_at DESC",
            SELECT_ATTEMPT
        ))
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to fetch billing history", e))?;

        rows.into_iter().map(ChargeAttempt::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip_through_parser() {
        for status in [AttemptStatus::Pending, AttemptStatus::Succeeded, AttemptStatus::Failed] {
            assert_eq!(parse_status(status.as_str()).unwrap(), status);
        }
        assert_eq!(
            parse_status("refunded").unwrap_err().code,
            ErrorCode::DatabaseError
        );
    }

    #[test]
    fn unknown_kind_is_a_database_error() {
        for kind in [ChargeKind::Subscription, ChargeKind::Renewal, ChargeKind::EarlyPayment] {
            assert_eq!(parse_kind(kind.as_str()).unwrap(), kind);
        }
        assert!(parse_kind("upgrade").is_err());
    }
}
