//! ReactivateSubscriptionHandler - Command handler for withdrawing a cancellation.

use crate::application::BillingContext;
use crate::domain::billing::{AuditEvent, BillingError};
use crate::domain::foundation::AccountId;

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionCommand {
    pub account_id: AccountId,
}

/// Handler for reactivation.
///
/// Only allowed while the scheduled end date is still in the future. After
/// that the account has to start a new subscription.
pub struct ReactivateSubscriptionHandler {
    ctx: BillingContext,
}

impl ReactivateSubscriptionHandler {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, cmd: ReactivateSubscriptionCommand) -> Result<(), BillingError> {
        let now = self.ctx.clock.now();
        let mut account = self.ctx.load_account(&cmd.account_id).await?;

        account.reactivate(self.ctx.policy(), now)?;
        self.ctx.accounts.update(&account).await?;

        tracing::info!(account_id = %account.id, "Subscription reactivated");
        self.ctx
            .record_audit(AuditEvent::Reactivated {
                account_id: account.id,
                occurred_at: now,
            })
            .await;
        Ok(())
    }
}
