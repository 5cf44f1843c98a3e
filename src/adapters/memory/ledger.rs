//! In-memory billing ledger.
//!
//! The uniqueness checks and the insert happen under one write lock, which
//! gives the same guarantee as the Postgres partial unique indexes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{AttemptStatus, ChargeAttempt};
use crate::domain::foundation::{AccountId, AttemptId, DomainError, ErrorCode, Timestamp};
use crate::ports::BillingLedger;

#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingLedger {
    attempts: Arc<RwLock<HashMap<AttemptId, ChargeAttempt>>>,
}

impl InMemoryBillingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All attempts in creation order.
    pub async fn all(&self) -> Vec<ChargeAttempt> {
        let mut all: Vec<ChargeAttempt> = self.attempts.read().await.values().cloned().collect();
        all.sort_by_key(|a| a.created_at);
        all
    }

    /// Attempts for one account with the given status.
    pub async fn count_with_status(&self, account_id: &AccountId, status: AttemptStatus) -> usize {
        self.attempts
            .read()
            .await
            .values()
            .filter(|a| a.account_id == *account_id && a.status == status)
            .count()
    }

    /// Replace an attempt directly, bypassing transitions.
    pub async fn put(&self, attempt: ChargeAttempt) {
        self.attempts.write().await.insert(attempt.id, attempt);
    }

    async fn settle<F>(&self, id: &AttemptId, apply: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut ChargeAttempt) -> Result<(), DomainError> + Send,
    {
        let mut attempts = self.attempts.write().await;
        let attempt = attempts.get_mut(id).ok_or_else(|| {
            DomainError::new(ErrorCode::AttemptNotFound, format!("Attempt not found: {}", id))
        })?;
        apply(attempt)
    }
}

#[async_trait]
impl BillingLedger for InMemoryBillingLedger {
    async fn record_pending(&self, attempt: &ChargeAttempt) -> Result<AttemptId, DomainError> {
        let mut attempts = self.attempts.write().await;
        let conflict = attempts.values().any(|existing| {
            existing.account_id == attempt.account_id
                && existing.period.start == attempt.period.start
                && existing.status.blocks_new_attempt()
        });
        if conflict {
            return Err(DomainError::new(
                ErrorCode::LedgerConflict,
                format!(
                    "Period starting {} is already paid or in flight",
                    attempt.period.start.as_datetime()
                ),
            )
            .with_detail("account_id", attempt.account_id.to_string()));
        }
        if let Some(in_flight) = attempts
            .values()
            .find(|existing| existing.account_id == attempt.account_id && existing.is_pending())
        {
            return Err(DomainError::new(
                ErrorCode::LedgerConflict,
                format!("Attempt {} is still awaiting settlement", in_flight.id),
            )
            .with_detail("account_id", attempt.account_id.to_string()));
        }
        attempts.insert(attempt.id, attempt.clone());
        Ok(attempt.id)
    }

    async fn mark_succeeded(
        &self,
        id: &AttemptId,
        processor_reference: &str,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        let reference = processor_reference.to_string();
        self.settle(id, move |attempt| attempt.succeed(reference, at)).await
    }

    async fn mark_failed(
        &self,
        id: &AttemptId,
        reason: &str,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        let reason = reason.to_string();
        self.settle(id, move |attempt| attempt.fail(reason, at)).await
    }

    async fn mark_failure_counted(&self, id: &AttemptId) -> Result<(), DomainError> {
        self.settle(id, |attempt| {
            attempt.failure_counted = true;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: &AttemptId) -> Result<Option<ChargeAttempt>, DomainError> {
        Ok(self.attempts.read().await.get(id).cloned())
    }

    async fn latest_for_period(
        &self,
        account_id: &AccountId,
        period_start: Timestamp,
    ) -> Result<Option<ChargeAttempt>, DomainError> {
        Ok(self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| a.account_id == *account_id && a.period.start == period_start)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn pending_for_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<ChargeAttempt>, DomainError> {
        Ok(self
            .attempts
            .read()
            .await
            .values()
            .find(|a| a.account_id == *account_id && a.is_pending())
            .cloned())
    }

    async fn find_unresolved(&self, cutoff: Timestamp) -> Result<Vec<ChargeAttempt>, DomainError> {
        let mut unresolved: Vec<ChargeAttempt> = self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| a.is_pending() && (a.failure_counted || a.created_at.is_before(&cutoff)))
            .cloned()
            .collect();
        unresolved.sort_by_key(|a| a.created_at);
        Ok(unresolved)
    }

    async fn history(&self, account_id: &AccountId) -> Result<Vec<ChargeAttempt>, DomainError> {
        let mut history: Vec<ChargeAttempt> = self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| a.account_id == *account_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{BillingPeriod, ChargeKind, PricingPolicy};

    fn attempt(account_id: AccountId, start: Timestamp) -> ChargeAttempt {
        ChargeAttempt::pending(
            account_id,
            ChargeKind::Renewal,
            BillingPeriod::starting_at(start, 30),
            &PricingPolicy::default().quote(0, 0),
            "usd",
            start,
        )
    }

    #[tokio::test]
    async fn second_pending_for_same_period_conflicts() {
        let ledger = InMemoryBillingLedger::new();
        let account = AccountId::new();
        let start = Timestamp::now();

        ledger.record_pending(&attempt(account, start)).await.unwrap();
        let err = ledger.record_pending(&attempt(account, start)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::LedgerConflict);
    }

    #[tokio::test]
    async fn failed_attempt_does_not_block_retry() {
        let ledger = InMemoryBillingLedger::new();
        let account = AccountId::new();
        let start = Timestamp::now();

        let first = ledger.record_pending(&attempt(account, start)).await.unwrap();
        ledger.mark_failed(&first, "card_declined", start).await.unwrap();
        assert!(ledger.record_pending(&attempt(account, start)).await.is_ok());
    }

    #[tokio::test]
    async fn succeeded_attempt_blocks_retry() {
        let ledger = InMemoryBillingLedger::new();
        let account = AccountId::new();
        let start = Timestamp::now();

        let first = ledger.record_pending(&attempt(account, start)).await.unwrap();
        ledger.mark_succeeded(&first, "pi_1", start).await.unwrap();
        assert!(ledger.record_pending(&attempt(account, start)).await.is_err());
    }

    #[tokio::test]
    async fn pending_attempt_blocks_other_periods_for_the_account() {
        let ledger = InMemoryBillingLedger::new();
        let account = AccountId::new();
        let now = Timestamp::now();
        let first = attempt(account, now);
        ledger.record_pending(&first).await.unwrap();

        let err = ledger
            .record_pending(&attempt(account, now.add_days(1)))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::LedgerConflict);
        assert!(ledger
            .record_pending(&attempt(AccountId::new(), now))
            .await
            .is_ok());

        ledger.mark_failed(&first.id, "card_declined", now).await.unwrap();
        assert!(ledger
            .record_pending(&attempt(account, now.add_days(1)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn pending_for_account_ignores_settled_attempts() {
        let ledger = InMemoryBillingLedger::new();
        let account = AccountId::new();
        let now = Timestamp::now();
        let settled = attempt(account, now.minus_days(30));
        ledger.record_pending(&settled).await.unwrap();
        ledger.mark_succeeded(&settled.id, "pi_1", now).await.unwrap();
        assert!(ledger.pending_for_account(&account).await.unwrap().is_none());

        let open = attempt(account, now);
        ledger.record_pending(&open).await.unwrap();
        let found = ledger.pending_for_account(&account).await.unwrap().unwrap();
        assert_eq!(found.id, open.id);
    }

    #[tokio::test]
    async fn attempt_settles_once() {
        let ledger = InMemoryBillingLedger::new();
        let id = ledger
            .record_pending(&attempt(AccountId::new(), Timestamp::now()))
            .await
            .unwrap();
        ledger.mark_succeeded(&id, "pi_1", Timestamp::now()).await.unwrap();
        let err = ledger
            .mark_failed(&id, "late failure", Timestamp::now())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[tokio::test]
    async fn unknown_attempt_is_not_found() {
        let ledger = InMemoryBillingLedger::new();
        let err = ledger
            .mark_failed(&AttemptId::new(), "x", Timestamp::now())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AttemptNotFound);
    }

    #[tokio::test]
    async fn unresolved_includes_stale_and_counted() {
        let ledger = InMemoryBillingLedger::new();
        let now = Timestamp::now();
        let stale = attempt(AccountId::new(), now.minus_secs(3600));
        let fresh = attempt(AccountId::new(), now);
        let counted = attempt(AccountId::new(), now);
        ledger.record_pending(&stale).await.unwrap();
        ledger.record_pending(&fresh).await.unwrap();
        ledger.record_pending(&counted).await.unwrap();
        ledger.mark_failure_counted(&counted.id).await.unwrap();

        let ids: Vec<AttemptId> = ledger
            .find_unresolved(now.minus_secs(900))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert!(ids.contains(&stale.id));
        assert!(ids.contains(&counted.id));
        assert!(!ids.contains(&fresh.id));
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let ledger = InMemoryBillingLedger::new();
        let account = AccountId::new();
        let now = Timestamp::now();
        let older = attempt(account, now.minus_days(30));
        let newer = attempt(account, now);
        ledger.record_pending(&older).await.unwrap();
        ledger.mark_succeeded(&older.id, "pi_1", now).await.unwrap();
        ledger.record_pending(&newer).await.unwrap();

        let history = ledger.history(&account).await.unwrap();
        assert_eq!(history[0].id, newer.id);
        assert_eq!(history[1].id, older.id);
    }
}
