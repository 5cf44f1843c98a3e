//! PostgreSQL implementation of MembershipStore.
//!
//! `begin` opens a database transaction and takes a row lock on the
//! workspace with `SELECT ... FOR UPDATE`, so concurrent cascades for the
//! same workspace serialize. Dropping the transaction without commit rolls
//! back.

use crate::domain::foundation::{
    AccountId, DomainError, ErrorCode, MembershipId, Timestamp, WorkspaceId,
};
use crate::domain::workspace::{Privilege, Workspace, WorkspaceMembership};
use crate::ports::{MembershipStore, WorkspaceTransaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// PostgreSQL implementation of the MembershipStore port.
pub struct PostgresMembershipStore {
    pool: PgPool,
}

impl PostgresMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WorkspaceRow {
    id: Uuid,
    restricted_until: Option<DateTime<Utc>>,
}

impl From<WorkspaceRow> for Workspace {
    fn from(row: WorkspaceRow) -> Self {
        Workspace {
            id: WorkspaceId::from_uuid(row.id),
            restricted_until: row.restricted_until.map(Timestamp::from_datetime),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    id: Uuid,
    workspace_id: Uuid,
    account_id: Uuid,
    privilege: String,
}

impl TryFrom<MembershipRow> for WorkspaceMembership {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let privilege = match row.privilege.as_str() {
            "elevated" => Privilege::Elevated,
            "standard" => Privilege::Standard,
            other => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid privilege value: {}", other),
                ))
            }
        };
        Ok(WorkspaceMembership {
            id: MembershipId::from_uuid(row.id),
            workspace_id: WorkspaceId::from_uuid(row.workspace_id),
            account_id: AccountId::from_uuid(row.account_id),
            privilege,
        })
    }
}

const SELECT_ELEVATED: &str = r#"
    SELECT id, workspace_id, account_id, privilege
    FROM workspace_memberships
    WHERE workspace_id = $1 AND privilege = 'elevated'
    ORDER BY id
"#;

#[async_trait]
impl MembershipStore for PostgresMembershipStore {
    async fn elevated_workspaces(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<WorkspaceId>, DomainError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT workspace_id FROM workspace_memberships
            WHERE account_id = $1 AND privilege = 'elevated'
            ORDER BY workspace_id
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to list workspaces: {}", e))
        })?;

        Ok(rows.into_iter().map(|(id,)| WorkspaceId::from_uuid(id)).collect())
    }

    async fn list_elevated_holders(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<WorkspaceMembership>, DomainError> {
        let rows: Vec<MembershipRow> = sqlx::query_as(SELECT_ELEVATED)
            .bind(workspace_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to list holders: {}", e))
            })?;

        rows.into_iter().map(WorkspaceMembership::try_from).collect()
    }

    async fn find_workspace(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Option<Workspace>, DomainError> {
        let row: Option<WorkspaceRow> =
            sqlx::query_as("SELECT id, restricted_until FROM workspaces WHERE id = $1")
                .bind(workspace_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Failed to fetch workspace: {}", e),
                    )
                })?;

        Ok(row.map(Workspace::from))
    }

    async fn begin(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Box<dyn WorkspaceTransaction>, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to begin transaction: {}", e),
            )
        })?;

        let row: Option<WorkspaceRow> =
            sqlx::query_as("SELECT id, restricted_until FROM workspaces WHERE id = $1 FOR UPDATE")
                .bind(workspace_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Failed to lock workspace: {}", e),
                    )
                })?;

        let workspace = row.map(Workspace::from).ok_or_else(|| {
            DomainError::new(
                ErrorCode::WorkspaceNotFound,
                format!("Workspace not found: {}", workspace_id),
            )
        })?;

        Ok(Box::new(PostgresWorkspaceTransaction { tx, workspace }))
    }
}

/// Locked view of one workspace inside a database transaction.
struct PostgresWorkspaceTransaction {
    tx: Transaction<'static, Postgres>,
    workspace: Workspace,
}

#[async_trait]
impl WorkspaceTransaction for PostgresWorkspaceTransaction {
    async fn workspace(&mut self) -> Result<Workspace, DomainError> {
        Ok(self.workspace.clone())
    }

    async fn elevated_holders(&mut self) -> Result<Vec<WorkspaceMembership>, DomainError> {
        let rows: Vec<MembershipRow> = sqlx::query_as(&format!("{} FOR UPDATE", SELECT_ELEVATED))
            .bind(self.workspace.id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to lock holders: {}", e))
            })?;

        rows.into_iter().map(WorkspaceMembership::try_from).collect()
    }

    async fn demote(&mut self, membership_id: &MembershipId) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE workspace_memberships SET privilege = 'standard'
            WHERE id = $1 AND workspace_id = $2
            "#,
        )
        .bind(membership_id.as_uuid())
        .bind(self.workspace.id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to demote membership: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::MembershipNotFound,
                format!("Membership not found: {}", membership_id),
            ));
        }
        Ok(())
    }

    async fn set_restricted(&mut self, until: Timestamp) -> Result<(), DomainError> {
        sqlx::query("UPDATE workspaces SET restricted_until = $2 WHERE id = $1")
            .bind(self.workspace.id.as_uuid())
            .bind(until.as_datetime())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to restrict workspace: {}", e),
                )
            })?;

        self.workspace.restricted_until = Some(until);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to commit transaction: {}", e),
            )
        })
    }
}
