//! CancelSubscriptionHandler - Command handler for scheduling cancellation.

use crate::application::BillingContext;
use crate::domain::billing::{AuditEvent, BillingError};
use crate::domain::foundation::{AccountId, Timestamp};

/// Command to cancel at the end of the paid period.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub account_id: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelSubscriptionResult {
    /// When access ends.
    pub effective_at: Timestamp,
}

/// Handler for cancelling subscriptions.
///
/// Cancellation takes effect at the later of now and the renewal date.
/// Access continues until then; the sweep lapses the subscription.
pub struct CancelSubscriptionHandler {
    ctx: BillingContext,
}

impl CancelSubscriptionHandler {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, BillingError> {
        let now = self.ctx.clock.now();
        let mut account = self.ctx.load_account(&cmd.account_id).await?;

        let effective_at = account.schedule_cancellation(self.ctx.policy(), now)?;
        self.ctx.accounts.update(&account).await?;

        tracing::info!(
            account_id = %account.id,
            effective_at = %effective_at,
            "Cancellation scheduled"
        );
        self.ctx
            .record_audit(AuditEvent::CancellationScheduled {
                account_id: account.id,
                end_date: effective_at,
                occurred_at: now,
            })
            .await;

        Ok(CancelSubscriptionResult { effective_at })
    }
}
