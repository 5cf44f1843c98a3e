//! StartSubscriptionHandler - Command handler for the first paid period.

use crate::application::services::{ChargeExecutor, ChargeResult, UsageAggregator};
use crate::application::BillingContext;
use crate::domain::billing::{
    validate_pack_count, AuditEvent, BillingAccount, BillingError, BillingPeriod, ChargeAttempt,
    ChargeKind,
};
use crate::domain::foundation::{AccountId, AttemptId, Timestamp};

/// Command to start a subscription with a reserved pack count.
#[derive(Debug, Clone)]
pub struct StartSubscriptionCommand {
    pub account_id: AccountId,
    pub pack_count: u32,
}

/// Result of a successful first charge.
#[derive(Debug, Clone)]
pub struct StartSubscriptionResult {
    pub account: BillingAccount,
    pub attempt_id: AttemptId,
    pub amount_cents: i64,
    pub renewal_date: Timestamp,
}

/// Handler for starting subscriptions.
///
/// Charges one cycle immediately against the saved payment method. The
/// account only becomes subscribed once the charge succeeds.
pub struct StartSubscriptionHandler {
    ctx: BillingContext,
}

impl StartSubscriptionHandler {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        cmd: StartSubscriptionCommand,
    ) -> Result<StartSubscriptionResult, BillingError> {
        let now = self.ctx.clock.now();
        let account = self.ctx.load_account(&cmd.account_id).await?;
        start_with_first_charge(&self.ctx, account, cmd.pack_count, now).await
    }
}

/// Validates and charges the first period, then subscribes the account.
///
/// Shared with pay-now for accounts still on trial.
pub(crate) async fn start_with_first_charge(
    ctx: &BillingContext,
    mut account: BillingAccount,
    pack_count: u32,
    now: Timestamp,
) -> Result<StartSubscriptionResult, BillingError> {
    let policy = ctx.policy();

    // 1. Reject bad input before touching the ledger
    validate_pack_count(pack_count, policy)?;
    if account.payment_references().is_none() {
        return Err(BillingError::NoPaymentMethod(account.id));
    }
    let state = account.state(now, policy);
    if !state.can_start_subscription() {
        return Err(BillingError::invalid_state(state.to_string(), "start a subscription"));
    }
    ctx.ensure_no_charge_in_flight(&account.id).await?;

    // 2. Price the first cycle from current usage
    let usage = UsageAggregator::new(ctx.memberships.clone(), ctx.usage.clone())
        .usage_for(&account.id)
        .await?;
    let quote = policy.pricing.quote(usage, pack_count);
    let period = BillingPeriod::starting_at(now, policy.cycle_days);
    let attempt = ChargeAttempt::pending(
        account.id,
        ChargeKind::Subscription,
        period,
        &quote,
        policy.currency.clone(),
        now,
    );

    // 3. Charge
    let result = ChargeExecutor::new(ctx.clone())
        .execute(&account, attempt, now)
        .await?;

    let attempt = match result {
        ChargeResult::Succeeded { attempt, .. } => attempt,
        ChargeResult::Declined { reason, .. } => return Err(BillingError::declined(reason)),
        // Reconciliation starts the subscription if the charge went through.
        ChargeResult::Unresolved { reason, .. } => return Err(BillingError::transient(reason)),
    };

    // 4. Subscribe and persist
    account.start_subscription(pack_count, period, policy, now)?;
    ctx.accounts.update(&account).await?;

    tracing::info!(
        account_id = %account.id,
        attempt_id = %attempt.id,
        pack_count,
        amount_cents = attempt.amount_cents,
        "Subscription started"
    );
    ctx.record_audit(AuditEvent::SubscriptionStarted {
        account_id: account.id,
        attempt_id: attempt.id,
        pack_count,
        amount_cents: attempt.amount_cents,
        renewal_date: period.end,
        occurred_at: now,
    })
    .await;

    Ok(StartSubscriptionResult {
        account,
        attempt_id: attempt.id,
        amount_cents: attempt.amount_cents,
        renewal_date: period.end,
    })
}
