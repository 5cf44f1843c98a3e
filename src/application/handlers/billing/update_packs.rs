//! UpdatePacksHandler - Command handler for changing reserved usage packs.

use crate::application::services::UsageAggregator;
use crate::application::BillingContext;
use crate::domain::billing::{AuditEvent, BillingError, BillingState};
use crate::domain::foundation::AccountId;

/// Command to change the reserved pack count.
#[derive(Debug, Clone)]
pub struct UpdatePacksCommand {
    pub account_id: AccountId,
    pub pack_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePacksResult {
    pub pack_count: u32,
    pub storage_allowance_bytes: u64,
    /// Amount the next renewal will charge at current usage.
    pub projected_total_cents: i64,
}

/// Handler for pack changes.
///
/// Takes effect from the next charge; nothing is prorated. The new
/// allowance must still cover the account's current usage.
pub struct UpdatePacksHandler {
    ctx: BillingContext,
}

impl UpdatePacksHandler {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(&self, cmd: UpdatePacksCommand) -> Result<UpdatePacksResult, BillingError> {
        let now = self.ctx.clock.now();
        let policy = self.ctx.policy();
        let mut account = self.ctx.load_account(&cmd.account_id).await?;

        let state = account.state(now, policy);
        if matches!(state, BillingState::Permanent | BillingState::Terminated) {
            return Err(BillingError::invalid_state(state.to_string(), "change packs"));
        }

        let usage = UsageAggregator::new(self.ctx.memberships.clone(), self.ctx.usage.clone())
            .usage_for(&account.id)
            .await?;
        let old_pack_count = account.pack_count;
        let allowance = account.update_packs(cmd.pack_count, usage, policy, now)?;
        self.ctx.accounts.update(&account).await?;

        tracing::info!(
            account_id = %account.id,
            old_pack_count,
            new_pack_count = cmd.pack_count,
            "Storage packs updated"
        );
        self.ctx
            .record_audit(AuditEvent::PacksUpdated {
                account_id: account.id,
                old_pack_count,
                new_pack_count: cmd.pack_count,
                storage_allowance_bytes: allowance,
                occurred_at: now,
            })
            .await;

        Ok(UpdatePacksResult {
            pack_count: cmd.pack_count,
            storage_allowance_bytes: allowance,
            projected_total_cents: policy.pricing.quote(usage, cmd.pack_count).total_cents,
        })
    }
}
