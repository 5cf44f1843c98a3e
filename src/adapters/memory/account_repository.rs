//! In-memory billing account repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::BillingAccount;
use crate::domain::foundation::{AccountId, DomainError, ErrorCode};
use crate::ports::BillingAccountRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingAccountRepository {
    accounts: Arc<RwLock<HashMap<AccountId, BillingAccount>>>,
}

impl InMemoryBillingAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

#[async_trait]
impl BillingAccountRepository for InMemoryBillingAccountRepository {
    async fn insert(&self, account: &BillingAccount) -> Result<(), DomainError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) {
            return Err(DomainError::validation(
                "account_id",
                format!("Billing account {} already exists", account.id),
            ));
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update(&self, account: &BillingAccount) -> Result<(), DomainError> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&account.id) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::AccountNotFound,
                format!("Billing account not found: {}", account.id),
            )),
        }
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<BillingAccount>, DomainError> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn list_sweep_candidates(&self) -> Result<Vec<BillingAccount>, DomainError> {
        let accounts = self.accounts.read().await;
        let mut candidates: Vec<BillingAccount> = accounts
            .values()
            .filter(|a| !a.permanent)
            .filter(|a| a.subscribed || a.subscription_started_at.is_none())
            .cloned()
            .collect();
        candidates.sort_by_key(|a| a.id);
        Ok(candidates)
    }
}
