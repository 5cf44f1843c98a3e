//! ComputeInvoiceHandler - Query handler for the upcoming invoice.

use serde::Serialize;

use crate::application::services::UsageAggregator;
use crate::application::BillingContext;
use crate::domain::billing::{due_date, BillingError, BillingState, LineItem};
use crate::domain::foundation::{AccountId, Timestamp};

/// Query for an account's next invoice.
#[derive(Debug, Clone)]
pub struct ComputeInvoiceQuery {
    pub account_id: AccountId,
}

/// Projected invoice for the next obligation.
///
/// `due_date` and `days_until_due` are `None` for permanent accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceView {
    pub account_id: AccountId,
    pub state: BillingState,
    pub used_bytes: u64,
    pub base_amount_cents: i64,
    pub usage_packs: u32,
    pub billed_packs: u32,
    pub usage_charge_cents: i64,
    pub total_cents: i64,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub description: String,
    pub due_date: Option<Timestamp>,
    pub days_until_due: Option<u32>,
    pub can_pay_now: bool,
}

/// Read-only; repeated calls with unchanged inputs return the same view.
pub struct ComputeInvoiceHandler {
    ctx: BillingContext,
}

impl ComputeInvoiceHandler {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, query: ComputeInvoiceQuery) -> Result<InvoiceView, BillingError> {
        let now = self.ctx.clock.now();
        let policy = self.ctx.policy();
        let account = self.ctx.load_account(&query.account_id).await?;

        let used_bytes = UsageAggregator::new(self.ctx.memberships.clone(), self.ctx.usage.clone())
            .usage_for(&account.id)
            .await?;
        let quote = policy.pricing.quote(used_bytes, account.pack_count);
        let due = due_date::resolve(&account, policy, now);

        Ok(InvoiceView {
            account_id: account.id,
            state: account.state(now, policy),
            used_bytes,
            base_amount_cents: quote.base_amount_cents,
            usage_packs: quote.usage_packs,
            billed_packs: quote.billed_packs,
            usage_charge_cents: quote.usage_charge_cents,
            total_cents: quote.total_cents,
            currency: policy.currency.clone(),
            line_items: quote.line_items,
            description: quote.description,
            due_date: due.map(|d| d.due_date),
            days_until_due: due.map(|d| d.days_until_due),
            can_pay_now: due_date::can_pay_now(&account, policy, now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::BillingAccount;
    use crate::application::test_support::TestStack;

    fn query(account_id: AccountId) -> ComputeInvoiceQuery {
        ComputeInvoiceQuery { account_id }
    }

    #[tokio::test]
    async fn trial_invoice_is_base_fee_due_at_trial_end() {
        let stack = TestStack::new();
        let id = stack.trial_account().await;

        let view = ComputeInvoiceHandler::new(stack.context())
            .handle(query(id))
            .await
            .unwrap();

        assert_eq!(view.state, BillingState::Trial);
        assert_eq!(view.total_cents, 300);
        assert_eq!(view.usage_packs, 0);
        assert_eq!(view.due_date, Some(stack.now().add_days(20)));
        assert_eq!(view.days_until_due, Some(20));
        assert!(view.can_pay_now);
    }

    #[tokio::test]
    async fn usage_beyond_allowance_adds_packs() {
        let stack = TestStack::new();
        let id = stack.active_account().await;
        let (workspace, _) = stack.memberships.seed_workspace(&[id]).await;
        let pricing = &stack.settings.policy.pricing;
        stack
            .usage
            .set_usage(workspace, pricing.free_allowance_bytes + pricing.pack_size_bytes + 1)
            .await;

        let view = ComputeInvoiceHandler::new(stack.context())
            .handle(query(id))
            .await
            .unwrap();

        assert_eq!(view.usage_packs, 2);
        assert_eq!(view.usage_charge_cents, 200);
        assert_eq!(view.total_cents, 500);
        assert_eq!(view.days_until_due, Some(10));
        assert!(!view.can_pay_now);
    }

    #[tokio::test]
    async fn permanent_account_has_no_due_date() {
        let stack = TestStack::new();
        let id = stack
            .insert(BillingAccount::new_permanent(
                AccountId::new(),
                stack.now(),
                &stack.settings.policy,
            ))
            .await;

        let view = ComputeInvoiceHandler::new(stack.context())
            .handle(query(id))
            .await
            .unwrap();

        assert_eq!(view.state, BillingState::Permanent);
        assert_eq!(view.due_date, None);
        assert!(!view.can_pay_now);
    }

    #[tokio::test]
    async fn invoice_is_stable_across_calls() {
        let stack = TestStack::new();
        let id = stack.active_account().await;
        let handler = ComputeInvoiceHandler::new(stack.context());

        let first = handler.handle(query(id)).await.unwrap();
        let second = handler.handle(query(id)).await.unwrap();

        assert_eq!(first, second);
        assert!(stack.ledger.all().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let stack = TestStack::new();
        let id = AccountId::new();

        let err = ComputeInvoiceHandler::new(stack.context())
            .handle(query(id))
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::AccountNotFound(id));
    }
}
