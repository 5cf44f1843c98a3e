//! In-memory usage store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, WorkspaceId};
use crate::ports::UsageStore;

#[derive(Debug, Clone, Default)]
pub struct InMemoryUsageStore {
    bytes: Arc<RwLock<HashMap<WorkspaceId, u64>>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_usage(&self, workspace_id: WorkspaceId, bytes: u64) {
        self.bytes.write().await.insert(workspace_id, bytes);
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn sum_metered_bytes(&self, workspaces: &[WorkspaceId]) -> Result<u64, DomainError> {
        let bytes = self.bytes.read().await;
        Ok(workspaces
            .iter()
            .filter_map(|ws| bytes.get(ws))
            .fold(0u64, |acc, b| acc.saturating_add(*b)))
    }
}
