//! PostgreSQL adapters - Database implementations of the billing ports.
//!
//! - `PostgresBillingAccountRepository` - Billing account state
//! - `PostgresBillingLedger` - Charge attempts with the open-period unique index
//! - `PostgresMembershipStore` - Workspace memberships with row-locked transactions
//! - `PostgresUsageStore` - Metered workspace usage
//! - `PostgresReminderStore` - Per-day reminder claims
//! - `PostgresAuditLog` / `PostgresReminderOutbox` - Append-only event tables
//!
//! Schema lives in `migrations/`.

mod account_repository;
mod audit_log;
mod ledger;
mod membership_store;
mod reminder_store;
mod usage_store;

pub use account_repository::PostgresBillingAccountRepository;
pub use audit_log::{PostgresAuditLog, PostgresReminderOutbox};
pub use ledger::PostgresBillingLedger;
pub use membership_store::PostgresMembershipStore;
pub use reminder_store::PostgresReminderStore;
pub use usage_store::PostgresUsageStore;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Converts a counter to the `INTEGER` column type.
fn to_db_count(field: &str, value: u32) -> Result<i32, DomainError> {
    i32::try_from(value).map_err(|_| {
        DomainError::new(
            ErrorCode::ValidationFailed,
            format!("{} out of range: {}", field, value),
        )
    })
}

/// Reads an `INTEGER` counter column, rejecting negative values.
fn from_db_count(field: &str, value: i32) -> Result<u32, DomainError> {
    u32::try_from(value).map_err(|_| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Negative {} in database: {}", field, value),
        )
    })
}
