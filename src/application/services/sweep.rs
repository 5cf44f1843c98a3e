//! Nightly sweep entry point.
//!
//! One run: reconcile pending attempts, send reminders, then collect from
//! every candidate account in order. Accounts are processed sequentially
//! and a failure for one account never stops the run. Safe to re-invoke;
//! ledger uniqueness and the per-day attempt rule make a second run on the
//! same day a no-op for accounts already handled.

use crate::application::services::{
    CollectionOutcome, CollectionService, ReconciliationService, ReminderScheduler, SkipReason,
};
use crate::application::BillingContext;
use crate::domain::billing::BillingError;
use crate::domain::foundation::{AccountId, Timestamp};

/// Counts for one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub started_at: Timestamp,
    pub candidates: usize,
    pub reconciled: usize,
    pub reminders_sent: usize,
    pub charged: usize,
    pub failed: usize,
    pub terminated: usize,
    pub lapsed: usize,
    pub recovered: usize,
    pub skipped: usize,
    /// Accounts whose processing raised an error, with the message.
    pub errors: Vec<(AccountId, String)>,
}

pub struct NightlySweep {
    ctx: BillingContext,
}

impl NightlySweep {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Runs one sweep at the clock's current time.
    ///
    /// # Errors
    ///
    /// Only when the candidate list itself cannot be loaded. Per-account
    /// failures are reported in the summary.
    pub async fn run(&self) -> Result<SweepSummary, BillingError> {
        let now = self.ctx.clock.now();
        let mut summary = SweepSummary {
            started_at: now,
            ..SweepSummary::default()
        };
        tracing::info!(started_at = %now, "Nightly billing sweep started");

        match ReconciliationService::new(self.ctx.clone())
            .reconcile_pending(now)
            .await
        {
            Ok(report) => summary.reconciled = report.resolved(),
            Err(e) => {
                // Unreconciled rows stay pending and keep blocking new attempts.
                tracing::error!(error = %e, "Reconciliation pass failed");
            }
        }

        let candidates = self.ctx.accounts.list_sweep_candidates().await?;
        summary.candidates = candidates.len();

        let reminders = ReminderScheduler::new(self.ctx.clone())
            .send_due_reminders(&candidates, now)
            .await;
        summary.reminders_sent = reminders.sent;

        let collection = CollectionService::new(self.ctx.clone());
        for account in &candidates {
            match collection.collect(&account.id, now).await {
                Ok(outcome) => tally(&mut summary, &outcome),
                Err(e) => {
                    tracing::error!(account_id = %account.id, error = %e, "Collection failed");
                    summary.errors.push((account.id, e.to_string()));
                }
            }
        }

        tracing::info!(
            candidates = summary.candidates,
            reconciled = summary.reconciled,
            reminders_sent = summary.reminders_sent,
            reminder_errors = reminders.errors.len(),
            charged = summary.charged,
            failed = summary.failed,
            terminated = summary.terminated,
            lapsed = summary.lapsed,
            recovered = summary.recovered,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "Nightly billing sweep finished"
        );
        Ok(summary)
    }
}

fn tally(summary: &mut SweepSummary, outcome: &CollectionOutcome) {
    match outcome {
        CollectionOutcome::Charged { .. } => summary.charged += 1,
        CollectionOutcome::Failed { .. } => summary.failed += 1,
        CollectionOutcome::Terminated { .. } => summary.terminated += 1,
        CollectionOutcome::Lapsed => summary.lapsed += 1,
        CollectionOutcome::Recovered { .. } => summary.recovered += 1,
        CollectionOutcome::Skipped(SkipReason::NotBillable | SkipReason::NotDue) => {}
        CollectionOutcome::Skipped(_) => summary.skipped += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::stripe::ScriptedCharge;
    use crate::application::test_support::TestStack;
    use crate::domain::billing::AttemptStatus;
    use crate::ports::{BillingAccountRepository, BillingLedger};

    #[tokio::test]
    async fn sweep_charges_due_accounts_and_leaves_others() {
        let stack = TestStack::new();
        let due = stack.due_account("cus_due").await;
        let active = stack.active_account().await;
        stack.trial_account().await;

        let summary = NightlySweep::new(stack.context()).run().await.unwrap();

        assert_eq!(summary.candidates, 3);
        assert_eq!(summary.charged, 1);
        assert_eq!(summary.failed, 0);
        assert!(summary.errors.is_empty());
        assert_eq!(stack.ledger.count_with_status(&due, AttemptStatus::Succeeded).await, 1);
        assert!(stack.ledger.history(&active).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_run_same_day_charges_nothing() {
        let stack = TestStack::new();
        let ok = stack.due_account("cus_ok").await;
        let declined = stack.due_account("cus_declined").await;
        stack
            .processor
            .set_customer_behavior("cus_declined", ScriptedCharge::Decline("card_declined".into()));
        let sweep = NightlySweep::new(stack.context());

        let first = sweep.run().await.unwrap();
        let second = sweep.run().await.unwrap();

        assert_eq!((first.charged, first.failed), (1, 1));
        assert_eq!((second.charged, second.failed), (0, 0));
        assert_eq!(second.skipped, 1);
        assert_eq!(stack.processor.call_count("charge"), 2);
        assert_eq!(stack.account(&declined).await.failure_count, 1);
        assert_eq!(stack.ledger.count_with_status(&ok, AttemptStatus::Succeeded).await, 1);
    }

    #[tokio::test]
    async fn account_error_does_not_abort_sweep() {
        let stack = TestStack::new();
        let first = stack.due_account("cus_first").await;
        let second = stack.due_account("cus_second").await;

        // A subscribed account without references fails collection.
        let mut broken = stack.account(&first).await;
        broken.payment_method_id = None;
        stack.accounts.update(&broken).await.unwrap();

        let summary = NightlySweep::new(stack.context()).run().await.unwrap();

        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].0, first);
        assert_eq!(summary.charged, 1);
        assert_eq!(stack.ledger.count_with_status(&second, AttemptStatus::Succeeded).await, 1);
    }
}
