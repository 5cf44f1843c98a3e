//! PayNowHandler - Command handler for paying the next obligation early.

use crate::application::handlers::billing::start_subscription::start_with_first_charge;
use crate::application::services::collection::apply_success;
use crate::application::services::{ChargeExecutor, ChargeResult, UsageAggregator};
use crate::application::BillingContext;
use crate::domain::billing::{due_date, BillingError, BillingState, ChargeAttempt, ChargeKind};
use crate::domain::foundation::{AccountId, AttemptId, Timestamp};

/// Command to pay the upcoming obligation now.
#[derive(Debug, Clone)]
pub struct PayNowCommand {
    pub account_id: AccountId,
}

/// Result of an early payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayNowResult {
    pub attempt_id: AttemptId,
    pub amount_cents: i64,
    pub renewal_date: Timestamp,
    /// True when the payment started the subscription.
    pub started_subscription: bool,
}

/// Handler for "pay now".
///
/// Accepted for trial accounts and within the early-payment window before
/// the due date. A trial payment starts the subscription with the reserved
/// pack count; otherwise the next renewal period is charged ahead of the
/// sweep. A declined or unanswered early payment does not count as a
/// collection failure; the sweep still collects on the due date.
pub struct PayNowHandler {
    ctx: BillingContext,
}

impl PayNowHandler {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, cmd: PayNowCommand) -> Result<PayNowResult, BillingError> {
        let now = self.ctx.clock.now();
        let policy = self.ctx.policy();
        let mut account = self.ctx.load_account(&cmd.account_id).await?;

        // 1. Check the window
        let state = account.state(now, policy);
        if matches!(
            state,
            BillingState::Permanent | BillingState::Cancelled | BillingState::Terminated
        ) {
            return Err(BillingError::invalid_state(state.to_string(), "pay now"));
        }
        if !due_date::can_pay_now(&account, policy, now) {
            let days_until_due = due_date::resolve(&account, policy, now)
                .map_or(0, |due| due.days_until_due);
            return Err(BillingError::PayNowNotPermitted { days_until_due });
        }

        // 2. Trial: the payment is the first subscription charge
        if !state.is_subscribed() {
            let pack_count = account.pack_count;
            let started = start_with_first_charge(&self.ctx, account, pack_count, now).await?;
            return Ok(PayNowResult {
                attempt_id: started.attempt_id,
                amount_cents: started.amount_cents,
                renewal_date: started.renewal_date,
                started_subscription: true,
            });
        }

        // 3. Subscribed: charge the next renewal period early
        self.ctx.ensure_no_charge_in_flight(&account.id).await?;
        let period = due_date::next_renewal_period(&account, policy);
        let usage = UsageAggregator::new(self.ctx.memberships.clone(), self.ctx.usage.clone())
            .usage_for(&account.id)
            .await?;
        let quote = policy.pricing.quote(usage, account.pack_count);
        let attempt = ChargeAttempt::pending(
            account.id,
            ChargeKind::EarlyPayment,
            period,
            &quote,
            policy.currency.clone(),
            now,
        );

        let result = ChargeExecutor::new(self.ctx.clone())
            .execute(&account, attempt, now)
            .await?;

        match result {
            ChargeResult::Succeeded { attempt, reference } => {
                apply_success(&self.ctx, &mut account, &attempt, &reference, now).await?;
                Ok(PayNowResult {
                    attempt_id: attempt.id,
                    amount_cents: attempt.amount_cents,
                    renewal_date: account.renewal_date.unwrap_or(period.end),
                    started_subscription: false,
                })
            }
            ChargeResult::Declined { reason, .. } => Err(BillingError::declined(reason)),
            ChargeResult::Unresolved { reason, .. } => Err(BillingError::transient(reason)),
        }
    }
}
