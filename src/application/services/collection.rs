//! Collection of due renewals and failure escalation.
//!
//! Per due account: lapse a due cancellation, otherwise compute usage and
//! the charge for the next period, run it through the `ChargeExecutor`, and
//! apply the outcome to the account. Reaching the failure threshold
//! terminates the account and runs the cascade exactly once.

use crate::application::services::{
    CascadeEnforcer, CascadeReport, ChargeExecutor, ChargeResult, UsageAggregator,
};
use crate::application::BillingContext;
use crate::domain::billing::{
    due_date, AttemptStatus, AuditEvent, BillingAccount, BillingError, BillingState,
    ChargeAttempt, ChargeKind,
};
use crate::domain::foundation::{AccountId, AttemptId, Timestamp};

/// Why an account was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not in a subscribed state.
    NotBillable,
    NotDue,
    /// An attempt for the period is still pending.
    InFlight,
    /// The period already failed today.
    AttemptedToday,
}

/// What collection did for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOutcome {
    Charged {
        attempt_id: AttemptId,
        amount_cents: i64,
    },
    Failed {
        attempt_id: AttemptId,
        failure_count: u32,
    },
    Terminated {
        attempt_id: AttemptId,
        cascade: CascadeReport,
    },
    /// Scheduled cancellation took effect.
    Lapsed,
    /// Ledger already held a success the account had not applied.
    Recovered { attempt_id: AttemptId },
    Skipped(SkipReason),
}

/// Result of applying a failed charge to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    PastDue(u32),
    Terminated(CascadeReport),
}

pub struct CollectionService {
    ctx: BillingContext,
}

impl CollectionService {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Collects the next renewal for one account if it is due.
    pub async fn collect(
        &self,
        account_id: &AccountId,
        now: Timestamp,
    ) -> Result<CollectionOutcome, BillingError> {
        let mut account = self.ctx.load_account(account_id).await?;
        let policy = self.ctx.policy();

        if !account.state(now, policy).is_subscribed() {
            return Ok(CollectionOutcome::Skipped(SkipReason::NotBillable));
        }

        if account.cancellation_due(now, policy) {
            account.lapse(policy, now)?;
            self.ctx.accounts.update(&account).await?;
            tracing::info!(account_id = %account.id, "Scheduled cancellation took effect");
            self.ctx
                .record_audit(AuditEvent::SubscriptionLapsed {
                    account_id: account.id,
                    occurred_at: now,
                })
                .await;
            return Ok(CollectionOutcome::Lapsed);
        }

        let Some(due) = due_date::resolve(&account, policy, now) else {
            return Ok(CollectionOutcome::Skipped(SkipReason::NotBillable));
        };
        if !due.is_due() {
            return Ok(CollectionOutcome::Skipped(SkipReason::NotDue));
        }

        let period = due_date::next_renewal_period(&account, policy);
        if let Some(latest) = self
            .ctx
            .ledger
            .latest_for_period(&account.id, period.start)
            .await?
        {
            match latest.status {
                AttemptStatus::Pending => {
                    return Ok(CollectionOutcome::Skipped(SkipReason::InFlight));
                }
                AttemptStatus::Succeeded => {
                    tracing::warn!(
                        account_id = %account.id,
                        attempt_id = %latest.id,
                        "Applying ledger success missing from account"
                    );
                    let reference = latest.processor_reference.clone().unwrap_or_default();
                    apply_success(&self.ctx, &mut account, &latest, &reference, now).await?;
                    return Ok(CollectionOutcome::Recovered {
                        attempt_id: latest.id,
                    });
                }
                AttemptStatus::Failed
                    if latest.kind.counts_failures() && latest.created_at.date() == now.date() =>
                {
                    return Ok(CollectionOutcome::Skipped(SkipReason::AttemptedToday));
                }
                AttemptStatus::Failed => {}
            }
        }

        let usage = UsageAggregator::new(self.ctx.memberships.clone(), self.ctx.usage.clone())
            .usage_for(&account.id)
            .await?;
        let quote = policy.pricing.quote(usage, account.pack_count);
        let attempt = ChargeAttempt::pending(
            account.id,
            ChargeKind::Renewal,
            period,
            &quote,
            policy.currency.clone(),
            now,
        );

        let result = match ChargeExecutor::new(self.ctx.clone())
            .execute(&account, attempt, now)
            .await
        {
            Ok(result) => result,
            Err(BillingError::AlreadySettled) => {
                return Ok(CollectionOutcome::Skipped(SkipReason::InFlight));
            }
            Err(e) => return Err(e),
        };

        match result {
            ChargeResult::Succeeded { attempt, reference } => {
                apply_success(&self.ctx, &mut account, &attempt, &reference, now).await?;
                Ok(CollectionOutcome::Charged {
                    attempt_id: attempt.id,
                    amount_cents: attempt.amount_cents,
                })
            }
            ChargeResult::Declined { attempt, reason } => {
                self.failure_outcome(&mut account, &attempt, &reason, now).await
            }
            ChargeResult::Unresolved { attempt, reason } => {
                self.ctx.ledger.mark_failure_counted(&attempt.id).await?;
                self.failure_outcome(&mut account, &attempt, &reason, now).await
            }
        }
    }

    async fn failure_outcome(
        &self,
        account: &mut BillingAccount,
        attempt: &ChargeAttempt,
        reason: &str,
        now: Timestamp,
    ) -> Result<CollectionOutcome, BillingError> {
        Ok(match escalate_failure(&self.ctx, account, attempt, reason, now).await? {
            FailureOutcome::PastDue(failure_count) => CollectionOutcome::Failed {
                attempt_id: attempt.id,
                failure_count,
            },
            FailureOutcome::Terminated(cascade) => CollectionOutcome::Terminated {
                attempt_id: attempt.id,
                cascade,
            },
        })
    }
}

/// Applies a settled renewal to the account and audits it.
pub(crate) async fn apply_success(
    ctx: &BillingContext,
    account: &mut BillingAccount,
    attempt: &ChargeAttempt,
    reference: &str,
    now: Timestamp,
) -> Result<(), BillingError> {
    account.record_successful_charge(attempt.period, ctx.policy(), now)?;
    ctx.accounts.update(account).await?;
    ctx.record_audit(AuditEvent::ChargeSucceeded {
        account_id: account.id,
        attempt_id: attempt.id,
        amount_cents: attempt.amount_cents,
        processor_reference: reference.to_string(),
        occurred_at: now,
    })
    .await;
    Ok(())
}

/// Counts a failed renewal; terminates and cascades at the threshold.
pub(crate) async fn escalate_failure(
    ctx: &BillingContext,
    account: &mut BillingAccount,
    attempt: &ChargeAttempt,
    reason: &str,
    now: Timestamp,
) -> Result<FailureOutcome, BillingError> {
    let state = account.record_failed_charge(ctx.policy(), now)?;
    ctx.accounts.update(account).await?;
    ctx.record_audit(AuditEvent::ChargeFailed {
        account_id: account.id,
        attempt_id: attempt.id,
        amount_cents: attempt.amount_cents,
        reason: reason.to_string(),
        failure_count: account.failure_count,
        occurred_at: now,
    })
    .await;

    if state != BillingState::Terminated {
        tracing::info!(
            account_id = %account.id,
            failure_count = account.failure_count,
            "Account past due"
        );
        return Ok(FailureOutcome::PastDue(account.failure_count));
    }

    tracing::warn!(
        account_id = %account.id,
        failure_count = account.failure_count,
        "Failure threshold reached; account terminated"
    );
    ctx.record_audit(AuditEvent::AccountTerminated {
        account_id: account.id,
        failure_count: account.failure_count,
        occurred_at: now,
    })
    .await;

    let cascade = CascadeEnforcer::new(ctx.clone())
        .enforce(&account.id, now)
        .await?;
    Ok(FailureOutcome::Terminated(cascade))
}
