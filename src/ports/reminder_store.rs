//! Reminder store port.
//!
//! Guarantees at most one reminder per account per calendar day, however
//! many times the sweep runs.

use chrono::NaiveDate;

use crate::domain::foundation::{AccountId, DomainError};
use crate::domain::reminder::ReminderRecord;
use async_trait::async_trait;

#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Claim the (account, day) slot.
    ///
    /// Returns `false` if a reminder was already claimed for that day.
    async fn try_claim(&self, record: &ReminderRecord) -> Result<bool, DomainError>;

    /// Release a claim whose dispatch failed so a later run can retry.
    async fn release(&self, account_id: &AccountId, day: NaiveDate) -> Result<(), DomainError>;

    /// Most recent reminder sent to an account.
    async fn last_sent(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<ReminderRecord>, DomainError>;
}
