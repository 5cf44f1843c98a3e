//! Billing account aggregate.
//!
//! One `BillingAccount` per paying identity. Accounts are never deleted; a
//! terminated or cancelled account simply stops being subscribed.
//!
//! # Design Decisions
//!
//! - **Money in cents**: amounts never pass through floating point
//! - **Classification in one place**: lifecycle checks go through
//!   [`BillingState::classify`], never raw field combinations
//! - **Clock injected**: every mutation takes `now` from the caller

use serde::{Deserialize, Serialize};

use super::{BillingError, BillingPeriod, BillingPolicy, BillingState};
use crate::domain::foundation::{AccountId, StateMachine, Timestamp};

/// Billing account aggregate.
///
/// # Invariants
///
/// - `failure_count` resets to 0 on every successful charge
/// - `failure_count >= failure_threshold` never persists on a subscribed account
/// - `storage_allowance_bytes == free + pack_count * pack_size`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAccount {
    pub id: AccountId,

    /// Account creation; the trial runs from here.
    pub created_at: Timestamp,

    /// Subscription status flag.
    pub subscribed: bool,

    /// Start of the most recent subscription.
    pub subscription_started_at: Option<Timestamp>,

    /// End of the last paid period.
    pub renewal_date: Option<Timestamp>,

    /// Scheduled end of the subscription. Far-future values mark permanent accounts.
    pub end_date: Option<Timestamp>,

    /// Consecutive failed charges.
    pub failure_count: u32,

    /// Set when the failure threshold ended the subscription.
    pub terminated_at: Option<Timestamp>,

    /// Explicit never-billed override.
    pub permanent: bool,

    /// Processor customer reference.
    pub processor_customer_id: Option<String>,

    /// Processor payment method reference.
    pub payment_method_id: Option<String>,

    /// Reserved usage packs.
    pub pack_count: u32,

    /// Storage allowance derived from `pack_count`.
    pub storage_allowance_bytes: u64,

    pub updated_at: Timestamp,
}

impl BillingAccount {
    /// Creates an account that starts its trial at `created_at`.
    pub fn new_trial(id: AccountId, created_at: Timestamp, policy: &BillingPolicy) -> Self {
        Self {
            id,
            created_at,
            subscribed: false,
            subscription_started_at: None,
            renewal_date: None,
            end_date: None,
            failure_count: 0,
            terminated_at: None,
            permanent: false,
            processor_customer_id: None,
            payment_method_id: None,
            pack_count: 0,
            storage_allowance_bytes: policy.pricing.allowance_for_packs(0),
            updated_at: created_at,
        }
    }

    /// Creates a never-billed account.
    pub fn new_permanent(id: AccountId, created_at: Timestamp, policy: &BillingPolicy) -> Self {
        Self {
            permanent: true,
            ..Self::new_trial(id, created_at, policy)
        }
    }

    /// Current lifecycle state.
    pub fn state(&self, now: Timestamp, policy: &BillingPolicy) -> BillingState {
        BillingState::classify(self, now, policy)
    }

    pub fn trial_end(&self, policy: &BillingPolicy) -> Timestamp {
        self.created_at.add_days(policy.trial_days)
    }

    /// True while an unsubscribed account is still inside its trial.
    pub fn is_on_trial(&self, now: Timestamp, policy: &BillingPolicy) -> bool {
        self.state(now, policy) == BillingState::Trial && now.is_before(&self.trial_end(policy))
    }

    /// Saved processor customer and method, if both exist.
    pub fn payment_references(&self) -> Option<(&str, &str)> {
        match (&self.processor_customer_id, &self.payment_method_id) {
            (Some(customer), Some(method)) => Some((customer.as_str(), method.as_str())),
            _ => None,
        }
    }

    pub fn set_payment_method(
        &mut self,
        customer_id: impl Into<String>,
        method_id: impl Into<String>,
        now: Timestamp,
    ) {
        self.processor_customer_id = Some(customer_id.into());
        self.payment_method_id = Some(method_id.into());
        self.updated_at = now;
    }

    /// True when a subscribed account has a pending cancellation.
    pub fn has_scheduled_cancellation(&self, now: Timestamp, policy: &BillingPolicy) -> bool {
        self.state(now, policy).is_subscribed() && self.end_date.is_some()
    }

    /// True when a scheduled cancellation's end date has been reached.
    pub fn cancellation_due(&self, now: Timestamp, policy: &BillingPolicy) -> bool {
        self.has_scheduled_cancellation(now, policy)
            && self.end_date.map_or(false, |end| !end.is_after(&now))
    }

    /// Starts a subscription funded by a first charge for `period`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the account is Trial, Cancelled or Terminated.
    pub fn start_subscription(
        &mut self,
        pack_count: u32,
        period: BillingPeriod,
        policy: &BillingPolicy,
        now: Timestamp,
    ) -> Result<(), BillingError> {
        let state = self.state(now, policy);
        if !state.can_start_subscription() {
            return Err(BillingError::invalid_state(state.to_string(), "start a subscription"));
        }
        self.transition(BillingState::Active, "start a subscription", policy, now)?;
        self.subscribed = true;
        self.subscription_started_at = Some(now);
        self.renewal_date = Some(period.end);
        self.end_date = None;
        self.failure_count = 0;
        self.terminated_at = None;
        self.pack_count = pack_count;
        self.storage_allowance_bytes = policy.pricing.allowance_for_packs(pack_count);
        self.updated_at = now;
        Ok(())
    }

    /// Applies a successful renewal for `period`.
    ///
    /// A scheduled cancellation is left in place.
    pub fn record_successful_charge(
        &mut self,
        period: BillingPeriod,
        policy: &BillingPolicy,
        now: Timestamp,
    ) -> Result<(), BillingError> {
        let state = self.state(now, policy);
        if !state.is_subscribed() {
            return Err(BillingError::invalid_state(state.to_string(), "record a renewal"));
        }
        self.transition(BillingState::Active, "record a renewal", policy, now)?;
        let renewal = match self.renewal_date {
            Some(current) if current.is_after(&period.end) => current,
            _ => period.end,
        };
        self.renewal_date = Some(renewal);
        self.failure_count = 0;
        self.updated_at = now;
        Ok(())
    }

    /// Counts one failed charge and terminates at the threshold.
    ///
    /// Returns the resulting state: `PastDue(n)` or `Terminated`.
    pub fn record_failed_charge(
        &mut self,
        policy: &BillingPolicy,
        now: Timestamp,
    ) -> Result<BillingState, BillingError> {
        let failures = self.failure_count.saturating_add(1);
        let target = if failures >= policy.failure_threshold {
            BillingState::Terminated
        } else {
            BillingState::PastDue(failures)
        };
        self.transition(target, "record a failed charge", policy, now)?;

        self.failure_count = failures;
        if target == BillingState::Terminated {
            self.subscribed = false;
            self.terminated_at = Some(now);
            self.end_date = None;
        }
        self.updated_at = now;
        Ok(target)
    }

    /// Schedules cancellation at the later of `now` and the renewal date.
    ///
    /// # Errors
    ///
    /// - `AlreadyScheduledForCancellation` if an end date is already set
    /// - `InvalidState` if the account is not subscribed
    pub fn schedule_cancellation(
        &mut self,
        policy: &BillingPolicy,
        now: Timestamp,
    ) -> Result<Timestamp, BillingError> {
        let state = self.state(now, policy);
        if !state.is_subscribed() {
            return Err(BillingError::invalid_state(state.to_string(), "cancel"));
        }
        if self.end_date.is_some() {
            return Err(BillingError::AlreadyScheduledForCancellation);
        }

        let end = match self.renewal_date {
            Some(renewal) if renewal.is_after(&now) => renewal,
            _ => now,
        };
        self.end_date = Some(end);
        self.updated_at = now;
        Ok(end)
    }

    /// Clears a scheduled cancellation whose end date has not passed.
    ///
    /// # Errors
    ///
    /// - `NotEligibleToReactivate` if the end date passed or the subscription lapsed
    /// - `InvalidState` if nothing is scheduled
    pub fn reactivate(
        &mut self,
        policy: &BillingPolicy,
        now: Timestamp,
    ) -> Result<(), BillingError> {
        let state = self.state(now, policy);
        match state {
            BillingState::Cancelled => Err(BillingError::NotEligibleToReactivate),
            BillingState::Active | BillingState::PastDue(_) => match self.end_date {
                None => Err(BillingError::invalid_state(
                    state.to_string(),
                    "reactivate without a scheduled cancellation",
                )),
                Some(end) if !end.is_after(&now) => Err(BillingError::NotEligibleToReactivate),
                Some(_) => {
                    self.end_date = None;
                    self.updated_at = now;
                    Ok(())
                }
            },
            other => Err(BillingError::invalid_state(other.to_string(), "reactivate")),
        }
    }

    /// Ends a subscription whose scheduled cancellation has taken effect.
    pub fn lapse(&mut self, policy: &BillingPolicy, now: Timestamp) -> Result<(), BillingError> {
        if !self.cancellation_due(now, policy) {
            return Err(BillingError::invalid_state(
                self.state(now, policy).to_string(),
                "lapse before the scheduled end date",
            ));
        }
        self.transition(BillingState::Cancelled, "lapse", policy, now)?;
        self.subscribed = false;
        self.updated_at = now;
        Ok(())
    }

    /// Changes the reserved pack count.
    ///
    /// Returns the new storage allowance.
    ///
    /// # Errors
    ///
    /// `Validation` if the count exceeds `max_packs` or the allowance would
    /// fall below `current_usage_bytes`.
    pub fn update_packs(
        &mut self,
        pack_count: u32,
        current_usage_bytes: u64,
        policy: &BillingPolicy,
        now: Timestamp,
    ) -> Result<u64, BillingError> {
        validate_pack_count(pack_count, policy)?;
        let allowance = policy.pricing.allowance_for_packs(pack_count);
        if allowance < current_usage_bytes {
            return Err(BillingError::validation(
                "pack_count",
                format!(
                    "{} packs allow {} bytes but {} bytes are in use",
                    pack_count, allowance, current_usage_bytes
                ),
            ));
        }
        self.pack_count = pack_count;
        self.storage_allowance_bytes = allowance;
        self.updated_at = now;
        Ok(allowance)
    }

    fn transition(
        &self,
        target: BillingState,
        action: &str,
        policy: &BillingPolicy,
        now: Timestamp,
    ) -> Result<BillingState, BillingError> {
        let current = self.state(now, policy);
        current
            .transition_to(target)
            .map_err(|_| BillingError::invalid_state(current.to_string(), action))
    }
}

/// Rejects pack counts above the configured maximum.
pub fn validate_pack_count(pack_count: u32, policy: &BillingPolicy) -> Result<(), BillingError> {
    if pack_count > policy.max_packs {
        return Err(BillingError::validation(
            "pack_count",
            format!("must be at most {}", policy.max_packs),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BillingPolicy {
        BillingPolicy::default()
    }

    fn subscribed_account(now: Timestamp) -> BillingAccount {
        let mut account =
            BillingAccount::new_trial(AccountId::new(), now.minus_days(40), &policy());
        account
            .start_subscription(0, BillingPeriod::starting_at(now, 30), &policy(), now)
            .unwrap();
        account
    }

    #[test]
    fn new_trial_has_free_allowance() {
        let account = BillingAccount::new_trial(AccountId::new(), Timestamp::now(), &policy());
        assert_eq!(account.storage_allowance_bytes, policy().pricing.free_allowance_bytes);
        assert_eq!(account.failure_count, 0);
        assert!(!account.subscribed);
    }

    #[test]
    fn start_sets_renewal_and_allowance() {
        let now = Timestamp::now();
        let mut account = BillingAccount::new_trial(AccountId::new(), now, &policy());
        let period = BillingPeriod::starting_at(now, 30);
        account.start_subscription(2, period, &policy(), now).unwrap();

        assert!(account.subscribed);
        assert_eq!(account.renewal_date, Some(now.add_days(30)));
        assert_eq!(account.pack_count, 2);
        assert_eq!(account.storage_allowance_bytes, policy().pricing.allowance_for_packs(2));
        assert_eq!(account.state(now, &policy()), BillingState::Active);
    }

    #[test]
    fn start_rejected_while_subscribed() {
        let now = Timestamp::now();
        let mut account = subscribed_account(now);
        let before = account.clone();
        let period = BillingPeriod::starting_at(now, 30);

        let result = account.start_subscription(2, period, &policy(), now);

        assert!(matches!(result, Err(BillingError::InvalidState { .. })));
        assert_eq!(account, before);
    }

    #[test]
    fn start_rejected_while_past_due() {
        let now = Timestamp::now();
        let mut account = subscribed_account(now);
        account.record_failed_charge(&policy(), now).unwrap();
        let renewal = account.renewal_date;
        let period = BillingPeriod::starting_at(now, 30);

        let result = account.start_subscription(0, period, &policy(), now);

        assert!(matches!(result, Err(BillingError::InvalidState { .. })));
        assert_eq!(account.renewal_date, renewal);
        assert_eq!(account.failure_count, 1);
    }

    #[test]
    fn failures_escalate_to_termination() {
        let now = Timestamp::now();
        let mut account = subscribed_account(now);

        assert_eq!(account.record_failed_charge(&policy(), now).unwrap(), BillingState::PastDue(1));
        assert_eq!(account.record_failed_charge(&policy(), now).unwrap(), BillingState::PastDue(2));
        assert_eq!(account.record_failed_charge(&policy(), now).unwrap(), BillingState::Terminated);
        assert!(!account.subscribed);
        assert_eq!(account.terminated_at, Some(now));

        assert!(account.record_failed_charge(&policy(), now).is_err());
    }

    #[test]
    fn success_resets_failures() {
        let now = Timestamp::now();
        let mut account = subscribed_account(now);
        account.record_failed_charge(&policy(), now).unwrap();
        account.record_failed_charge(&policy(), now).unwrap();

        let period = BillingPeriod::starting_at(now.add_days(30), 30);
        account.record_successful_charge(period, &policy(), now).unwrap();
        assert_eq!(account.failure_count, 0);
        assert_eq!(account.renewal_date, Some(period.end));
    }

    #[test]
    fn cancel_ends_at_renewal_date() {
        let now = Timestamp::now();
        let mut account = subscribed_account(now);
        let end = account.schedule_cancellation(&policy(), now).unwrap();
        assert_eq!(end, now.add_days(30));
        assert!(account.has_scheduled_cancellation(now, &policy()));
    }

    #[test]
    fn cancel_twice_is_rejected() {
        let now = Timestamp::now();
        let mut account = subscribed_account(now);
        account.schedule_cancellation(&policy(), now).unwrap();
        assert_eq!(
            account.schedule_cancellation(&policy(), now),
            Err(BillingError::AlreadyScheduledForCancellation)
        );
    }

    #[test]
    fn cancel_requires_subscription() {
        let now = Timestamp::now();
        let mut account = BillingAccount::new_trial(AccountId::new(), now, &policy());
        assert!(matches!(
            account.schedule_cancellation(&policy(), now),
            Err(BillingError::InvalidState { .. })
        ));
    }

    #[test]
    fn reactivate_before_end_clears_cancellation() {
        let now = Timestamp::now();
        let mut account = subscribed_account(now);
        account.schedule_cancellation(&policy(), now).unwrap();
        account.reactivate(&policy(), now.add_days(10)).unwrap();
        assert!(account.end_date.is_none());
    }

    #[test]
    fn reactivate_after_end_is_not_eligible() {
        let now = Timestamp::now();
        let mut account = subscribed_account(now);
        account.schedule_cancellation(&policy(), now).unwrap();
        let later = now.add_days(31);
        assert_eq!(
            account.reactivate(&policy(), later),
            Err(BillingError::NotEligibleToReactivate)
        );

        account.lapse(&policy(), later).unwrap();
        assert_eq!(account.state(later, &policy()), BillingState::Cancelled);
        assert_eq!(
            account.reactivate(&policy(), later),
            Err(BillingError::NotEligibleToReactivate)
        );
    }

    #[test]
    fn lapse_before_end_is_rejected() {
        let now = Timestamp::now();
        let mut account = subscribed_account(now);
        account.schedule_cancellation(&policy(), now).unwrap();
        assert!(account.lapse(&policy(), now.add_days(5)).is_err());
        assert!(account.subscribed);
    }

    #[test]
    fn update_packs_validates_bounds_and_usage() {
        let now = Timestamp::now();
        let mut account = subscribed_account(now);
        let p = policy();

        assert!(matches!(
            account.update_packs(p.max_packs + 1, 0, &p, now),
            Err(BillingError::Validation { .. })
        ));

        let usage = p.pricing.allowance_for_packs(2) + 1;
        assert!(account.update_packs(2, usage, &p, now).is_err());
        assert_eq!(
            account.update_packs(3, usage, &p, now).unwrap(),
            p.pricing.allowance_for_packs(3)
        );
        assert_eq!(account.pack_count, 3);
    }

    #[test]
    fn permanent_account_cannot_start() {
        let now = Timestamp::now();
        let mut account = BillingAccount::new_permanent(AccountId::new(), now, &policy());
        let period = BillingPeriod::starting_at(now, 30);
        let result = account.start_subscription(0, period, &policy(), now);
        assert!(matches!(result, Err(BillingError::InvalidState { .. })));
    }

    #[test]
    fn trial_expires_after_trial_days() {
        let now = Timestamp::now();
        let account = BillingAccount::new_trial(AccountId::new(), now, &policy());
        assert!(account.is_on_trial(now.add_days(19), &policy()));
        assert!(!account.is_on_trial(now.add_days(20), &policy()));
    }
}
