//! Reconciliation of ledger attempts stuck in `pending`.
//!
//! Runs before collection in every sweep. Each unresolved attempt is looked
//! up at the processor by its idempotency key and settled from the answer,
//! so collection never starts a second in-flight charge for a period.

use crate::application::services::collection::{apply_success, escalate_failure};
use crate::application::BillingContext;
use crate::domain::billing::{AuditEvent, BillingError, ChargeAttempt, ChargeKind};
use crate::domain::foundation::{AttemptId, Timestamp};
use crate::ports::ChargeOutcome;

/// How one pending attempt was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Succeeded,
    Failed,
    /// Processor could not be asked; retried next run.
    StillPending,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub succeeded: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errors: Vec<(AttemptId, String)>,
}

impl ReconciliationReport {
    pub fn resolved(&self) -> usize {
        self.succeeded + self.failed
    }
}

pub struct ReconciliationService {
    ctx: BillingContext,
}

impl ReconciliationService {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Resolves pending attempts older than the grace period, and every
    /// attempt whose failure was already counted.
    pub async fn reconcile_pending(
        &self,
        now: Timestamp,
    ) -> Result<ReconciliationReport, BillingError> {
        let cutoff = now.minus_secs(self.ctx.settings.pending_grace.as_secs());
        let unresolved = self.ctx.ledger.find_unresolved(cutoff).await?;
        let mut report = ReconciliationReport::default();

        for attempt in unresolved {
            match self.reconcile(&attempt, now).await {
                Ok(Resolution::Succeeded) => report.succeeded += 1,
                Ok(Resolution::Failed) => report.failed += 1,
                Ok(Resolution::StillPending) => report.still_pending += 1,
                Err(e) => {
                    tracing::error!(
                        attempt_id = %attempt.id,
                        account_id = %attempt.account_id,
                        error = %e,
                        "Reconciliation failed"
                    );
                    report.errors.push((attempt.id, e.to_string()));
                }
            }
        }

        if report != ReconciliationReport::default() {
            tracing::info!(
                succeeded = report.succeeded,
                failed = report.failed,
                still_pending = report.still_pending,
                errors = report.errors.len(),
                "Reconciliation pass complete"
            );
        }
        Ok(report)
    }

    async fn reconcile(
        &self,
        attempt: &ChargeAttempt,
        now: Timestamp,
    ) -> Result<Resolution, BillingError> {
        let key = attempt.idempotency_key();
        let lookup = tokio::time::timeout(
            self.ctx.settings.processor_timeout,
            self.ctx.processor.lookup_charge(&key),
        )
        .await;

        let outcome = match lookup {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(
                    attempt_id = %attempt.id,
                    error = %e,
                    "Charge lookup failed; will retry"
                );
                return Ok(Resolution::StillPending);
            }
            Err(_) => {
                tracing::warn!(attempt_id = %attempt.id, "Charge lookup timed out; will retry");
                return Ok(Resolution::StillPending);
            }
        };

        match outcome {
            Some(ChargeOutcome::Succeeded { reference }) => {
                self.ctx
                    .ledger
                    .mark_succeeded(&attempt.id, &reference, now)
                    .await?;
                tracing::info!(
                    attempt_id = %attempt.id,
                    account_id = %attempt.account_id,
                    processor_reference = %reference,
                    "Reconciled pending attempt as succeeded"
                );
                self.apply_reconciled_success(attempt, &reference, now).await?;
                Ok(Resolution::Succeeded)
            }
            Some(ChargeOutcome::Declined { reason }) => {
                self.settle_failed(attempt, &format!("reconciled: {}", reason), now)
                    .await?;
                Ok(Resolution::Failed)
            }
            None => {
                self.settle_failed(attempt, "reconciled: charge not found at processor", now)
                    .await?;
                Ok(Resolution::Failed)
            }
        }
    }

    async fn apply_reconciled_success(
        &self,
        attempt: &ChargeAttempt,
        reference: &str,
        now: Timestamp,
    ) -> Result<(), BillingError> {
        let mut account = self.ctx.load_account(&attempt.account_id).await?;
        let policy = self.ctx.policy();

        if attempt.kind == ChargeKind::Subscription && !account.subscribed {
            let pack_count = attempt.reserved_packs;
            account.start_subscription(pack_count, attempt.period, policy, now)?;
            self.ctx.accounts.update(&account).await?;
            self.ctx
                .record_audit(AuditEvent::SubscriptionStarted {
                    account_id: account.id,
                    attempt_id: attempt.id,
                    pack_count,
                    amount_cents: attempt.amount_cents,
                    renewal_date: attempt.period.end,
                    occurred_at: now,
                })
                .await;
            return Ok(());
        }

        match apply_success(&self.ctx, &mut account, attempt, reference, now).await {
            Err(BillingError::InvalidState { current, .. }) => {
                // Money was taken after the account left the subscribed states.
                tracing::warn!(
                    account_id = %account.id,
                    attempt_id = %attempt.id,
                    state = %current,
                    "Reconciled success for an account that is no longer subscribed"
                );
                Ok(())
            }
            other => other,
        }
    }

    async fn settle_failed(
        &self,
        attempt: &ChargeAttempt,
        reason: &str,
        now: Timestamp,
    ) -> Result<(), BillingError> {
        self.ctx.ledger.mark_failed(&attempt.id, reason, now).await?;
        tracing::info!(
            attempt_id = %attempt.id,
            account_id = %attempt.account_id,
            reason,
            "Reconciled pending attempt as failed"
        );

        if attempt.failure_counted || !attempt.kind.counts_failures() {
            return Ok(());
        }
        let mut account = self.ctx.load_account(&attempt.account_id).await?;
        if !account.state(now, self.ctx.policy()).is_subscribed() {
            return Ok(());
        }
        escalate_failure(&self.ctx, &mut account, attempt, reason, now).await?;
        Ok(())
    }
}
