//! Usage store port.

use crate::domain::foundation::{DomainError, WorkspaceId};
use async_trait::async_trait;

/// Metered resource consumption, recorded per workspace.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Total metered bytes currently held by the given workspaces.
    ///
    /// Returns 0 for an empty slice.
    async fn sum_metered_bytes(&self, workspaces: &[WorkspaceId]) -> Result<u64, DomainError>;
}
