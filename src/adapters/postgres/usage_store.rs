//! PostgreSQL implementation of UsageStore.

use crate::domain::foundation::{DomainError, ErrorCode, WorkspaceId};
use crate::ports::UsageStore;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Reads metered bytes from `workspace_usage`.
pub struct PostgresUsageStore {
    pool: PgPool,
}

impl PostgresUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for PostgresUsageStore {
    async fn sum_metered_bytes(&self, workspaces: &[WorkspaceId]) -> Result<u64, DomainError> {
        if workspaces.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = workspaces.iter().map(|w| *w.as_uuid()).collect();

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(metered_bytes), 0)::BIGINT
            FROM workspace_usage
            WHERE workspace_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to sum usage: {}", e))
        })?;

        u64::try_from(total).map_err(|_| {
            DomainError::new(ErrorCode::DatabaseError, format!("Negative usage total: {}", total))
        })
    }
}
