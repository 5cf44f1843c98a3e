//! In-memory reminder claims.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{AccountId, DomainError};
use crate::domain::reminder::ReminderRecord;
use crate::ports::ReminderStore;

#[derive(Debug, Clone, Default)]
pub struct InMemoryReminderStore {
    claims: Arc<RwLock<HashMap<(AccountId, NaiveDate), ReminderRecord>>>,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Days a reminder was claimed for an account, ascending.
    pub async fn days_for(&self, account_id: &AccountId) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = self
            .claims
            .read()
            .await
            .keys()
            .filter(|(account, _)| account == account_id)
            .map(|(_, day)| *day)
            .collect();
        days.sort();
        days
    }
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn try_claim(&self, record: &ReminderRecord) -> Result<bool, DomainError> {
        let mut claims = self.claims.write().await;
        let key = (record.account_id, record.day);
        if claims.contains_key(&key) {
            return Ok(false);
        }
        claims.insert(key, record.clone());
        Ok(true)
    }

    async fn release(&self, account_id: &AccountId, day: NaiveDate) -> Result<(), DomainError> {
        self.claims.write().await.remove(&(*account_id, day));
        Ok(())
    }

    async fn last_sent(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<ReminderRecord>, DomainError> {
        Ok(self
            .claims
            .read()
            .await
            .values()
            .filter(|r| r.account_id == *account_id)
            .max_by_key(|r| r.sent_at)
            .cloned())
    }
}
