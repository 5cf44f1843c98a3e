//! Billing state classification.
//!
//! Every call site that needs to know "where is this account in its billing
//! lifecycle" goes through [`BillingState::classify`]. Nothing else inspects
//! the raw date and flag combinations.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{BillingAccount, BillingPolicy};
use crate::domain::foundation::{StateMachine, Timestamp};

/// Lifecycle state of a billing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "failures")]
pub enum BillingState {
    /// Never billed (internal or support accounts).
    Permanent,

    /// Not subscribed yet. The trial may already have expired.
    Trial,

    /// Subscribed and in good standing.
    Active,

    /// Subscribed with `n` consecutive failed charges, below the threshold.
    PastDue(u32),

    /// A scheduled cancellation took effect. No cascade.
    Cancelled,

    /// Failure threshold reached. Not subscribed.
    Terminated,
}

impl BillingState {
    /// Classifies an account at `now`.
    pub fn classify(account: &BillingAccount, now: Timestamp, policy: &BillingPolicy) -> Self {
        if account.permanent {
            return BillingState::Permanent;
        }
        if let Some(end) = account.end_date {
            if end.is_after(&now.add_days(policy.permanent_horizon_days())) {
                return BillingState::Permanent;
            }
        }

        if !account.subscribed {
            if account.terminated_at.is_some() {
                return BillingState::Terminated;
            }
            if account.subscription_started_at.is_some() {
                return BillingState::Cancelled;
            }
            return BillingState::Trial;
        }

        if account.failure_count > 0 {
            BillingState::PastDue(account.failure_count)
        } else {
            BillingState::Active
        }
    }

    /// True for the subscribed states (`active*`).
    pub fn is_subscribed(&self) -> bool {
        matches!(self, BillingState::Active | BillingState::PastDue(_))
    }

    /// True when this account keeps a workspace's elevated coverage alive.
    pub fn covers_workspace(&self) -> bool {
        matches!(
            self,
            BillingState::Permanent | BillingState::Active | BillingState::PastDue(_)
        )
    }

    /// True when a new subscription may be started from this state.
    pub fn can_start_subscription(&self) -> bool {
        matches!(
            self,
            BillingState::Trial | BillingState::Cancelled | BillingState::Terminated
        )
    }

    /// True when the reminder sweep considers this account.
    pub fn receives_reminders(&self) -> bool {
        matches!(
            self,
            BillingState::Trial | BillingState::Active | BillingState::PastDue(_)
        )
    }

    /// Short label used in logs, errors and persistence.
    pub fn label(&self) -> &'static str {
        match self {
            BillingState::Permanent => "permanent",
            BillingState::Trial => "trial",
            BillingState::Active => "active",
            BillingState::PastDue(_) => "past_due",
            BillingState::Cancelled => "cancelled",
            BillingState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for BillingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingState::PastDue(n) => write!(f, "past_due({})", n),
            other => f.write_str(other.label()),
        }
    }
}

impl StateMachine for BillingState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use BillingState::*;
        match (self, target) {
            (Permanent, _) => false,
            // Start
            (Trial | Cancelled | Terminated, Active) => true,
            // Renewal
            (Active, Active) => true,
            // Failed charge
            (Active, PastDue(1)) => true,
            (PastDue(n), PastDue(m)) => *m == n.saturating_add(1),
            (Active | PastDue(_), Terminated) => true,
            // Recovery
            (PastDue(_), Active) => true,
            // Scheduled cancellation took effect
            (Active | PastDue(_), Cancelled) => true,
            _ => false,
        }
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use BillingState::*;
        match self {
            Permanent => vec![],
            Trial | Cancelled | Terminated => vec![Active],
            Active => vec![Active, PastDue(1), Terminated, Cancelled],
            PastDue(n) => vec![Active, PastDue(n.saturating_add(1)), Terminated, Cancelled],
        }
    }
}
