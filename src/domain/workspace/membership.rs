//! Workspace memberships and restricted mode.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AccountId, MembershipId, Timestamp, WorkspaceId};

/// Privilege level of a workspace member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    /// Administrative member billed for the workspace's usage.
    Elevated,
    Standard,
}

impl Privilege {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::Elevated => "elevated",
            Privilege::Standard => "standard",
        }
    }
}

/// A member's link between a workspace and a billing account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMembership {
    pub id: MembershipId,
    pub workspace_id: WorkspaceId,
    pub account_id: AccountId,
    pub privilege: Privilege,
}

impl WorkspaceMembership {
    pub fn new(workspace_id: WorkspaceId, account_id: AccountId, privilege: Privilege) -> Self {
        Self {
            id: MembershipId::new(),
            workspace_id,
            account_id,
            privilege,
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.privilege == Privilege::Elevated
    }
}

/// Workspace metadata the billing engine reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,

    /// Mutations are blocked until this instant; reads stay available.
    pub restricted_until: Option<Timestamp>,
}

impl Workspace {
    pub fn new(id: WorkspaceId) -> Self {
        Self {
            id,
            restricted_until: None,
        }
    }

    pub fn is_restricted(&self, now: Timestamp) -> bool {
        self.restricted_until.map_or(false, |until| until.is_after(&now))
    }
}
