//! In-memory membership store.
//!
//! Each workspace has its own async mutex; a transaction holds it from
//! `begin` until commit or drop, and buffers writes until commit.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::foundation::{
    AccountId, DomainError, ErrorCode, MembershipId, Timestamp, WorkspaceId,
};
use crate::domain::workspace::{Privilege, Workspace, WorkspaceMembership};
use crate::ports::{MembershipStore, WorkspaceTransaction};

#[derive(Debug, Clone, Default)]
pub struct InMemoryMembershipStore {
    workspaces: Arc<RwLock<HashMap<WorkspaceId, Workspace>>>,
    memberships: Arc<RwLock<HashMap<MembershipId, WorkspaceMembership>>>,
    locks: Arc<Mutex<HashMap<WorkspaceId, Arc<Mutex<()>>>>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_workspace(&self, workspace: Workspace) {
        self.workspaces.write().await.insert(workspace.id, workspace);
    }

    pub async fn add_membership(&self, membership: WorkspaceMembership) {
        self.memberships
            .write()
            .await
            .insert(membership.id, membership);
    }

    /// Creates a workspace with the given elevated holders.
    ///
    /// Returns the workspace ID and the memberships in input order.
    pub async fn seed_workspace(
        &self,
        elevated: &[AccountId],
    ) -> (WorkspaceId, Vec<WorkspaceMembership>) {
        let workspace = Workspace::new(WorkspaceId::new());
        let id = workspace.id;
        self.add_workspace(workspace).await;

        let mut created = Vec::with_capacity(elevated.len());
        for account in elevated {
            let membership = WorkspaceMembership::new(id, *account, Privilege::Elevated);
            self.add_membership(membership.clone()).await;
            created.push(membership);
        }
        (id, created)
    }

    pub async fn membership(&self, id: &MembershipId) -> Option<WorkspaceMembership> {
        self.memberships.read().await.get(id).cloned()
    }

    async fn lock_for(&self, workspace_id: &WorkspaceId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(*workspace_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn elevated_workspaces(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<WorkspaceId>, DomainError> {
        let mut workspaces: Vec<WorkspaceId> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|m| m.account_id == *account_id && m.is_elevated())
            .map(|m| m.workspace_id)
            .collect();
        workspaces.sort();
        workspaces.dedup();
        Ok(workspaces)
    }

    async fn list_elevated_holders(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<WorkspaceMembership>, DomainError> {
        let mut holders: Vec<WorkspaceMembership> = self
            .memberships
            .read()
            .await
            .values()
            .filter(|m| m.workspace_id == *workspace_id && m.is_elevated())
            .cloned()
            .collect();
        holders.sort_by_key(|m| m.id);
        Ok(holders)
    }

    async fn find_workspace(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Option<Workspace>, DomainError> {
        Ok(self.workspaces.read().await.get(workspace_id).cloned())
    }

    async fn begin(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Box<dyn WorkspaceTransaction>, DomainError> {
        if !self.workspaces.read().await.contains_key(workspace_id) {
            return Err(DomainError::new(
                ErrorCode::WorkspaceNotFound,
                format!("Workspace not found: {}", workspace_id),
            ));
        }
        let guard = self.lock_for(workspace_id).await.lock_owned().await;
        Ok(Box::new(InMemoryWorkspaceTransaction {
            store: self.clone(),
            workspace_id: *workspace_id,
            demotions: Vec::new(),
            restricted_until: None,
            _guard: guard,
        }))
    }
}

struct InMemoryWorkspaceTransaction {
    store: InMemoryMembershipStore,
    workspace_id: WorkspaceId,
    demotions: Vec<MembershipId>,
    restricted_until: Option<Timestamp>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl WorkspaceTransaction for InMemoryWorkspaceTransaction {
    async fn workspace(&mut self) -> Result<Workspace, DomainError> {
        let mut workspace = self
            .store
            .find_workspace(&self.workspace_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::WorkspaceNotFound,
                    format!("Workspace not found: {}", self.workspace_id),
                )
            })?;
        if self.restricted_until.is_some() {
            workspace.restricted_until = self.restricted_until;
        }
        Ok(workspace)
    }

    async fn elevated_holders(&mut self) -> Result<Vec<WorkspaceMembership>, DomainError> {
        let holders = self.store.list_elevated_holders(&self.workspace_id).await?;
        Ok(holders
            .into_iter()
            .filter(|m| !self.demotions.contains(&m.id))
            .collect())
    }

    async fn demote(&mut self, membership_id: &MembershipId) -> Result<(), DomainError> {
        let belongs = self
            .store
            .memberships
            .read()
            .await
            .get(membership_id)
            .map_or(false, |m| m.workspace_id == self.workspace_id);
        if !belongs {
            return Err(DomainError::new(
                ErrorCode::MembershipNotFound,
                format!("Membership {} not in workspace {}", membership_id, self.workspace_id),
            ));
        }
        self.demotions.push(*membership_id);
        Ok(())
    }

    async fn set_restricted(&mut self, until: Timestamp) -> Result<(), DomainError> {
        self.restricted_until = Some(until);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        {
            let mut memberships = self.store.memberships.write().await;
            for id in &self.demotions {
                if let Some(membership) = memberships.get_mut(id) {
                    membership.privilege = Privilege::Standard;
                }
            }
        }
        if let Some(until) = self.restricted_until {
            let mut workspaces = self.store.workspaces.write().await;
            if let Some(workspace) = workspaces.get_mut(&self.workspace_id) {
                workspace.restricted_until = Some(until);
            }
        }
        Ok(())
    }
}
