//! In-memory audit log and reminder notifier.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::AuditEvent;
use crate::domain::foundation::{AccountId, DomainError, ErrorCode};
use crate::ports::{AuditLog, PaymentReminder, ReminderNotifier};

/// Records audit events for assertions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }

    pub async fn events_for(&self, account_id: &AccountId) -> Vec<AuditEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.account_id() == *account_id)
            .cloned()
            .collect()
    }

    /// Number of recorded events with the given `event_type()`.
    pub async fn count(&self, event_type: &str) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn record(&self, event: &AuditEvent) -> Result<(), DomainError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

/// Collects reminders instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<PaymentReminder>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<PaymentReminder> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, account_id: &AccountId) -> Vec<PaymentReminder> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|r| r.account_id == *account_id)
            .cloned()
            .collect()
    }

    /// Makes every send fail until turned off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReminderNotifier for RecordingNotifier {
    async fn send_reminder(&self, reminder: &PaymentReminder) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                "Notification delivery unavailable",
            ));
        }
        self.sent.write().await.push(reminder.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    #[tokio::test]
    async fn counts_by_event_type() {
        let log = InMemoryAuditLog::new();
        let account_id = AccountId::new();
        log.record(&AuditEvent::Reactivated {
            account_id,
            occurred_at: Timestamp::now(),
        })
        .await
        .unwrap();

        assert_eq!(log.count("billing.reactivated").await, 1);
        assert_eq!(log.events_for(&account_id).await.len(), 1);
    }

    #[tokio::test]
    async fn failing_notifier_records_nothing() {
        let notifier = RecordingNotifier::new();
        notifier.set_failing(true);
        let reminder = PaymentReminder {
            account_id: AccountId::new(),
            projected_amount_cents: 300,
            currency: "usd".to_string(),
            due_date: Timestamp::now(),
            days_until_due: 5,
        };
        assert!(notifier.send_reminder(&reminder).await.is_err());
        assert!(notifier.sent().await.is_empty());

        notifier.set_failing(false);
        notifier.send_reminder(&reminder).await.unwrap();
        assert_eq!(notifier.sent().await, vec![reminder]);
    }
}
