//! Usage aggregation across the workspaces an account pays for.

use std::sync::Arc;

use crate::domain::foundation::{AccountId, DomainError};
use crate::ports::{MembershipStore, UsageStore};

/// Sums metered bytes over every workspace where the account holds
/// elevated privilege. Standard memberships never contribute.
///
/// Reads the membership store on every call; nothing is cached.
pub struct UsageAggregator {
    memberships: Arc<dyn MembershipStore>,
    usage: Arc<dyn UsageStore>,
}

impl UsageAggregator {
    pub fn new(memberships: Arc<dyn MembershipStore>, usage: Arc<dyn UsageStore>) -> Self {
        Self { memberships, usage }
    }

    pub async fn usage_for(&self, account_id: &AccountId) -> Result<u64, DomainError> {
        let workspaces = self.memberships.elevated_workspaces(account_id).await?;
        if workspaces.is_empty() {
            return Ok(0);
        }
        self.usage.sum_metered_bytes(&workspaces).await
    }
}
