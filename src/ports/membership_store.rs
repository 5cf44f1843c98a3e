//! Membership store port.
//!
//! Membership and workspace records belong to another subsystem. The engine
//! reads elevated holders and applies cascade writes through a transaction
//! scoped to one workspace: read the current holder set, decide, write.
//! Two sweeps cascading into the same workspace are serialized by the lock.

use crate::domain::foundation::{AccountId, DomainError, MembershipId, Timestamp, WorkspaceId};
use crate::domain::workspace::{Workspace, WorkspaceMembership};
use async_trait::async_trait;

/// Read and lock access to workspace memberships.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Workspaces where the account currently holds elevated privilege.
    async fn elevated_workspaces(&self, account_id: &AccountId)
        -> Result<Vec<WorkspaceId>, DomainError>;

    /// Elevated holders of a workspace, outside any transaction.
    async fn list_elevated_holders(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<WorkspaceMembership>, DomainError>;

    async fn find_workspace(&self, workspace_id: &WorkspaceId)
        -> Result<Option<Workspace>, DomainError>;

    /// Lock a workspace for a read-decide-write cascade.
    ///
    /// # Errors
    ///
    /// - `WorkspaceNotFound` if the workspace doesn't exist
    async fn begin(&self, workspace_id: &WorkspaceId)
        -> Result<Box<dyn WorkspaceTransaction>, DomainError>;
}

/// Exclusive access to one workspace until committed or dropped.
///
/// Dropping without `commit` discards the writes.
#[async_trait]
pub trait WorkspaceTransaction: Send {
    /// Workspace as seen under the lock.
    async fn workspace(&mut self) -> Result<Workspace, DomainError>;

    /// Elevated holders as seen under the lock.
    async fn elevated_holders(&mut self) -> Result<Vec<WorkspaceMembership>, DomainError>;

    /// Demote one membership to standard privilege.
    async fn demote(&mut self, membership_id: &MembershipId) -> Result<(), DomainError>;

    /// Block mutations in the workspace until `until`.
    async fn set_restricted(&mut self, until: Timestamp) -> Result<(), DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
