//! Reminder notifier port.
//!
//! Delivery (email, push) is owned by another subsystem.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AccountId, DomainError, Timestamp};
use async_trait::async_trait;

/// Reminder content handed to the delivery subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReminder {
    pub account_id: AccountId,
    pub projected_amount_cents: i64,
    pub currency: String,
    pub due_date: Timestamp,
    pub days_until_due: u32,
}

#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn send_reminder(&self, reminder: &PaymentReminder) -> Result<(), DomainError>;
}
