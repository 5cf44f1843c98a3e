//! Entitlement cascade for a terminated account.
//!
//! Each workspace is handled in its own transaction: lock the workspace,
//! read the current elevated holders, decide, write, commit. A failure in one
//! workspace does not stop the others.

use crate::application::BillingContext;
use crate::domain::billing::{AuditEvent, BillingAccount, BillingState};
use crate::domain::foundation::{AccountId, DomainError, Timestamp, WorkspaceId};
use crate::domain::workspace::{decide_cascade, CascadeDecision, HolderCoverage};

/// What the cascade did across all workspaces of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub actions: Vec<(WorkspaceId, CascadeDecision)>,
    pub errors: Vec<(WorkspaceId, String)>,
}

impl CascadeReport {
    pub fn restricted(&self) -> usize {
        self.actions
            .iter()
            .filter(|(_, d)| matches!(d, CascadeDecision::Restrict { .. }))
            .count()
    }

    pub fn demoted(&self) -> usize {
        self.actions
            .iter()
            .filter(|(_, d)| matches!(d, CascadeDecision::Demote { .. }))
            .count()
    }
}

pub struct CascadeEnforcer {
    ctx: BillingContext,
}

impl CascadeEnforcer {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Applies the cascade for `account_id` to every workspace it holds
    /// elevated privilege in.
    pub async fn enforce(
        &self,
        account_id: &AccountId,
        now: Timestamp,
    ) -> Result<CascadeReport, DomainError> {
        let workspaces = self.ctx.memberships.elevated_workspaces(account_id).await?;
        let mut report = CascadeReport::default();

        for workspace_id in workspaces {
            match self.enforce_in_workspace(account_id, &workspace_id, now).await {
                Ok(decision) => report.actions.push((workspace_id, decision)),
                Err(e) => {
                    tracing::error!(
                        account_id = %account_id,
                        workspace_id = %workspace_id,
                        error = %e,
                        "Cascade failed for workspace"
                    );
                    report.errors.push((workspace_id, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    async fn enforce_in_workspace(
        &self,
        account_id: &AccountId,
        workspace_id: &WorkspaceId,
        now: Timestamp,
    ) -> Result<CascadeDecision, DomainError> {
        let mut tx = self.ctx.memberships.begin(workspace_id).await?;
        let workspace = tx.workspace().await?;
        let holders = tx.elevated_holders().await?;

        let mut coverage = Vec::with_capacity(holders.len());
        for membership in holders {
            let state = self.holder_state(&membership.account_id, account_id, now).await?;
            coverage.push(HolderCoverage { membership, state });
        }

        let decision = decide_cascade(
            *account_id,
            &coverage,
            workspace.restricted_until,
            now,
            self.ctx.policy().restricted_mode_days,
        );

        match &decision {
            CascadeDecision::Restrict { until } => tx.set_restricted(*until).await?,
            CascadeDecision::Demote { membership_id, .. } => tx.demote(membership_id).await?,
            CascadeDecision::NotElevated | CascadeDecision::AlreadyRestricted { .. } => {}
        }
        tx.commit().await?;

        match &decision {
            CascadeDecision::Restrict { until } => {
                tracing::warn!(
                    account_id = %account_id,
                    workspace_id = %workspace_id,
                    restricted_until = %until.as_datetime(),
                    "Workspace restricted: no other paying holder"
                );
                self.ctx
                    .record_audit(AuditEvent::WorkspaceRestricted {
                        account_id: *account_id,
                        workspace_id: *workspace_id,
                        restricted_until: *until,
                        occurred_at: now,
                    })
                    .await;
            }
            CascadeDecision::Demote {
                membership_id,
                remaining_payers,
            } => {
                tracing::info!(
                    account_id = %account_id,
                    workspace_id = %workspace_id,
                    remaining_payers,
                    "Role demoted: workspace still covered"
                );
                self.ctx
                    .record_audit(AuditEvent::RoleDemoted {
                        account_id: *account_id,
                        workspace_id: *workspace_id,
                        membership_id: *membership_id,
                        remaining_payers: *remaining_payers,
                        occurred_at: now,
                    })
                    .await;
            }
            CascadeDecision::NotElevated | CascadeDecision::AlreadyRestricted { .. } => {
                tracing::debug!(
                    account_id = %account_id,
                    workspace_id = %workspace_id,
                    ?decision,
                    "Cascade made no change"
                );
            }
        }

        Ok(decision)
    }

    async fn holder_state(
        &self,
        holder: &AccountId,
        failing: &AccountId,
        now: Timestamp,
    ) -> Result<BillingState, DomainError> {
        if holder == failing {
            return Ok(BillingState::Terminated);
        }
        let account: Option<BillingAccount> = self.ctx.accounts.find_by_id(holder).await?;
        Ok(match account {
            Some(account) => account.state(now, self.ctx.policy()),
            None => {
                tracing::warn!(account_id = %holder, "Elevated holder has no billing account");
                BillingState::Terminated
            }
        })
    }
}
