//! Audit log port.

use crate::domain::billing::AuditEvent;
use crate::domain::foundation::DomainError;
use async_trait::async_trait;

/// Append-only audit trail owned by another subsystem.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), DomainError>;
}
