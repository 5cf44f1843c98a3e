//! Due-date resolution.
//!
//! The obligation date is the later of the trial end and the last renewal
//! date. The due date never precedes `now`.

use serde::{Deserialize, Serialize};

use super::{BillingAccount, BillingPeriod, BillingPolicy, BillingState};
use crate::domain::foundation::Timestamp;

/// Resolved due date for an account at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDate {
    /// Date the next obligation falls on. Stable across calls.
    pub obligation_date: Timestamp,

    /// `max(now, obligation_date)`.
    pub due_date: Timestamp,

    /// Whole days until `due_date`, rounded up. Zero means due.
    pub days_until_due: u32,
}

impl DueDate {
    pub fn is_due(&self) -> bool {
        self.days_until_due == 0
    }
}

/// Latest of the trial end and, for subscribed accounts, the renewal date.
pub fn obligation_date(account: &BillingAccount, policy: &BillingPolicy) -> Timestamp {
    let trial_end = account.trial_end(policy);
    match account.renewal_date {
        Some(renewal) if account.subscribed && renewal.is_after(&trial_end) => renewal,
        _ => trial_end,
    }
}

/// Resolves the due date. `None` for permanent accounts.
pub fn resolve(
    account: &BillingAccount,
    policy: &BillingPolicy,
    now: Timestamp,
) -> Option<DueDate> {
    if account.state(now, policy) == BillingState::Permanent {
        return None;
    }
    let obligation = obligation_date(account, policy);
    let due = if obligation.is_after(&now) { obligation } else { now };
    Some(DueDate {
        obligation_date: obligation,
        due_date: due,
        days_until_due: now.days_until_ceil(&due),
    })
}

/// Period the next renewal charge pays for.
pub fn next_renewal_period(account: &BillingAccount, policy: &BillingPolicy) -> BillingPeriod {
    BillingPeriod::starting_at(obligation_date(account, policy), policy.cycle_days)
}

/// Whether a "pay now" is accepted: inside the early window or on trial.
pub fn can_pay_now(account: &BillingAccount, policy: &BillingPolicy, now: Timestamp) -> bool {
    let state = account.state(now, policy);
    if !matches!(
        state,
        BillingState::Trial | BillingState::Active | BillingState::PastDue(_)
    ) {
        return false;
    }
    if account.is_on_trial(now, policy) {
        return true;
    }
    resolve(account, policy, now)
        .map_or(false, |due| due.days_until_due <= policy.pay_early_window_days)
}
