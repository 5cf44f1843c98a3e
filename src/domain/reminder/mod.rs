//! Payment reminder rules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::billing::BillingState;
use crate::domain::foundation::{AccountId, Timestamp};

/// When reminders are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPolicy {
    /// Days-until-due values that trigger a reminder.
    pub offsets_days: Vec<u32>,

    /// Subscribed accounts further out than this are skipped.
    pub horizon_days: u32,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            offsets_days: vec![5, 1],
            horizon_days: 7,
        }
    }
}

/// Outcome of evaluating one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderDecision {
    /// Days until due matches a configured offset.
    Send { days_until_due: u32 },
    /// Subscribed and beyond the horizon.
    BeyondHorizon,
    /// Not a reminder day.
    NotScheduled,
    /// State never receives reminders.
    Ineligible,
}

impl ReminderPolicy {
    pub fn evaluate(&self, state: BillingState, days_until_due: u32) -> ReminderDecision {
        if !state.receives_reminders() {
            return ReminderDecision::Ineligible;
        }
        if state.is_subscribed() && days_until_due > self.horizon_days {
            return ReminderDecision::BeyondHorizon;
        }
        if self.offsets_days.contains(&days_until_due) {
            ReminderDecision::Send { days_until_due }
        } else {
            ReminderDecision::NotScheduled
        }
    }
}

/// Claim that a reminder went out to an account on a calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub account_id: AccountId,
    pub day: NaiveDate,
    pub sent_at: Timestamp,
}

impl ReminderRecord {
    pub fn new(account_id: AccountId, sent_at: Timestamp) -> Self {
        Self {
            account_id,
            day: sent_at.date(),
            sent_at,
        }
    }
}
