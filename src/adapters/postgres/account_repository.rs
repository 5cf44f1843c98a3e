//! PostgreSQL implementation of BillingAccountRepository.

use crate::domain::billing::BillingAccount;
use crate::domain::foundation::{AccountId, DomainError, ErrorCode, Timestamp};
use crate::ports::BillingAccountRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{from_db_count, to_db_count};

/// PostgreSQL implementation of the BillingAccountRepository port.
pub struct PostgresBillingAccountRepository {
    pool: PgPool,
}

impl PostgresBillingAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a billing account.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    subscribed: bool,
    subscription_started_at: Option<DateTime<Utc>>,
    renewal_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    failure_count: i32,
    terminated_at: Option<DateTime<Utc>>,
    permanent: bool,
    processor_customer_id: Option<String>,
    payment_method_id: Option<String>,
    pack_count: i32,
    storage_allowance_bytes: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for BillingAccount {
    type Error = DomainError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(BillingAccount {
            id: AccountId::from_uuid(row.id),
            created_at: Timestamp::from_datetime(row.created_at),
            subscribed: row.subscribed,
            subscription_started_at: row.subscription_started_at.map(Timestamp::from_datetime),
            renewal_date: row.renewal_date.map(Timestamp::from_datetime),
            end_date: row.end_date.map(Timestamp::from_datetime),
            failure_count: from_db_count("failure_count", row.failure_count)?,
            terminated_at: row.terminated_at.map(Timestamp::from_datetime),
            permanent: row.permanent,
            processor_customer_id: row.processor_customer_id,
            payment_method_id: row.payment_method_id,
            pack_count: from_db_count("pack_count", row.pack_count)?,
            storage_allowance_bytes: u64::try_from(row.storage_allowance_bytes).map_err(|_| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Negative storage allowance: {}", row.storage_allowance_bytes),
                )
            })?,
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn allowance_to_db(bytes: u64) -> Result<i64, DomainError> {
    i64::try_from(bytes).map_err(|_| {
        DomainError::new(
            ErrorCode::ValidationFailed,
            format!("Storage allowance too large: {}", bytes),
        )
    })
}

const SELECT_ACCOUNT: &str = r#"
    SELECT id, created_at, subscribed, subscription_started_at, renewal_date, end_date,
           failure_count, terminated_at, permanent, processor_customer_id, payment_method_id,
           pack_count, storage_allowance_bytes, updated_at
    FROM billing_accounts
"#;

#[async_trait]
impl BillingAccountRepository for PostgresBillingAccountRepository {
    async fn insert(&self, account: &BillingAccount) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO billing_accounts (
                id, created_at, subscribed, subscription_started_at, renewal_date, end_date,
                failure_count, terminated_at, permanent, processor_customer_id,
                payment_method_id, pack_count, storage_allowance_bytes, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.created_at.as_datetime())
        .bind(account.subscribed)
        .bind(account.subscription_started_at.map(|t| *t.as_datetime()))
        .bind(account.renewal_date.map(|t| *t.as_datetime()))
        .bind(account.end_date.map(|t| *t.as_datetime()))
        .bind(to_db_count("failure_count", account.failure_count)?)
        .bind(account.terminated_at.map(|t| *t.as_datetime()))
        .bind(account.permanent)
        .bind(&account.processor_customer_id)
        .bind(&account.payment_method_id)
        .bind(to_db_count("pack_count", account.pack_count)?)
        .bind(allowance_to_db(account.storage_allowance_bytes)?)
        .bind(account.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert billing account: {}", e),
            )
        })?;

        Ok(())
    }

    async fn update(&self, account: &BillingAccount) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE billing_accounts SET
                subscribed = $2,
                subscription_started_at = $3,
                renewal_date = $4,
                end_date = $5,
                failure_count = $6,
                terminated_at = $7,
                permanent = $8,
                processor_customer_id = $9,
                payment_method_id = $10,
                pack_count = $11,
                storage_allowance_bytes = $12,
                updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.subscribed)
        .bind(account.subscription_started_at.map(|t| *t.as_datetime()))
        .bind(account.renewal_date.map(|t| *t.as_datetime()))
        .bind(account.end_date.map(|t| *t.as_datetime()))
        .bind(to_db_count("failure_count", account.failure_count)?)
        .bind(account.terminated_at.map(|t| *t.as_datetime()))
        .bind(account.permanent)
        .bind(&account.processor_customer_id)
        .bind(&account.payment_method_id)
        .bind(to_db_count("pack_count", account.pack_count)?)
        .bind(allowance_to_db(account.storage_allowance_bytes)?)
        .bind(account.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update billing account: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::AccountNotFound,
                format!("Billing account not found: {}", account.id),
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<BillingAccount>, DomainError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_ACCOUNT))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to fetch billing account: {}", e),
                )
            })?;

        row.map(BillingAccount::try_from).transpose()
    }

    async fn list_sweep_candidates(&self) -> Result<Vec<BillingAccount>, DomainError> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "{} WHERE permanent = FALSE \
             AND (subscribed = TRUE OR subscription_started_at IS NULL) \
             ORDER BY id",
            SELECT_ACCOUNT
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list billing accounts: {}", e),
            )
        })?;

        rows.into_iter().map(BillingAccount::try_from).collect()
    }
}
