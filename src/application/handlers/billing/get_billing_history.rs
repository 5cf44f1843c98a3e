//! GetBillingHistoryHandler - Query handler for an account's charge attempts.

use crate::application::BillingContext;
use crate::domain::billing::{BillingError, ChargeAttempt};
use crate::domain::foundation::AccountId;

#[derive(Debug, Clone)]
pub struct GetBillingHistoryQuery {
    pub account_id: AccountId,
}

/// Ledger rows for the account, newest first.
pub type GetBillingHistoryResult = Vec<ChargeAttempt>;

pub struct GetBillingHistoryHandler {
    ctx: BillingContext,
}

impl GetBillingHistoryHandler {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        query: GetBillingHistoryQuery,
    ) -> Result<GetBillingHistoryResult, BillingError> {
        let account = self.ctx.load_account(&query.account_id).await?;
        Ok(self.ctx.ledger.history(&account.id).await?)
    }
}
