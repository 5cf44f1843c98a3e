//! Billing ledger port.
//!
//! Append-only log of charge attempts keyed by account and billing period.
//! The ledger is the unit of idempotency: at most one `pending` or
//! `succeeded` row may exist per (account, period start), and at most one
//! `pending` row per account.

use crate::domain::billing::ChargeAttempt;
use crate::domain::foundation::{AccountId, AttemptId, DomainError, Timestamp};
use async_trait::async_trait;

/// Durable record of charge attempts.
#[async_trait]
pub trait BillingLedger: Send + Sync {
    /// Record a new attempt in `pending` status.
    ///
    /// # Errors
    ///
    /// - `LedgerConflict` if a pending or succeeded attempt already exists
    ///   for the same account and period start, or the account has any
    ///   other pending attempt
    /// - `DatabaseError` on persistence failure
    async fn record_pending(&self, attempt: &ChargeAttempt) -> Result<AttemptId, DomainError>;

    /// Move a pending attempt to `succeeded`.
    ///
    /// # Errors
    ///
    /// - `AttemptNotFound` if the attempt doesn't exist
    /// - `InvalidStateTransition` if it already left `pending`
    async fn mark_succeeded(
        &self,
        id: &AttemptId,
        processor_reference: &str,
        at: Timestamp,
    ) -> Result<(), DomainError>;

    /// Move a pending attempt to `failed`.
    ///
    /// # Errors
    ///
    /// - `AttemptNotFound` if the attempt doesn't exist
    /// - `InvalidStateTransition` if it already left `pending`
    async fn mark_failed(&self, id: &AttemptId, reason: &str, at: Timestamp)
        -> Result<(), DomainError>;

    /// Flag a pending attempt whose timeout already counted as a failure.
    async fn mark_failure_counted(&self, id: &AttemptId) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &AttemptId) -> Result<Option<ChargeAttempt>, DomainError>;

    /// Most recent attempt for an account and period start.
    async fn latest_for_period(
        &self,
        account_id: &AccountId,
        period_start: Timestamp,
    ) -> Result<Option<ChargeAttempt>, DomainError>;

    /// The account's unsettled attempt, if any.
    async fn pending_for_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<ChargeAttempt>, DomainError>;

    /// Pending attempts created before `cutoff` or flagged as counted failures.
    async fn find_unresolved(&self, cutoff: Timestamp) -> Result<Vec<ChargeAttempt>, DomainError>;

    /// All attempts for an account, newest first.
    async fn history(&self, account_id: &AccountId) -> Result<Vec<ChargeAttempt>, DomainError>;
}
