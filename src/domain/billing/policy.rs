//! Billing policy constants.

use serde::{Deserialize, Serialize};

use super::PricingPolicy;
use crate::domain::foundation::ValidationError;

/// Lifecycle and pricing constants consumed by the billing domain.
///
/// Built from configuration; the defaults match production values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPolicy {
    /// Pricing and pack granularity.
    pub pricing: PricingPolicy,

    /// ISO currency code passed to the processor.
    pub currency: String,

    /// Upper bound for a reserved pack count.
    pub max_packs: u32,

    /// Trial length counted from account creation.
    pub trial_days: i64,

    /// Length of one billing cycle.
    pub cycle_days: i64,

    /// Consecutive failed charges that terminate the billing relationship.
    pub failure_threshold: u32,

    /// How long a workspace stays restricted after losing its last payer.
    pub restricted_mode_days: i64,

    /// How early before the due date a "pay now" is accepted.
    pub pay_early_window_days: u32,

    /// End dates further out than this mark a permanent account.
    pub permanent_horizon_years: i64,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            currency: "usd".to_string(),
            max_packs: 100,
            trial_days: 20,
            cycle_days: 30,
            failure_threshold: 3,
            restricted_mode_days: 30,
            pay_early_window_days: 7,
            permanent_horizon_years: 50,
        }
    }
}

impl BillingPolicy {
    /// Validates policy values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pricing.validate()?;
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                "must be a three-letter ISO code",
            ));
        }
        if self.cycle_days <= 0 {
            return Err(ValidationError::invalid_format(
                "cycle_days",
                "must be positive",
            ));
        }
        if self.trial_days < 0 || self.restricted_mode_days <= 0 {
            return Err(ValidationError::invalid_format(
                "trial_days",
                "trial and restricted-mode windows must be non-negative",
            ));
        }
        if self.failure_threshold == 0 {
            return Err(ValidationError::out_of_range("failure_threshold", 1, 10, 0));
        }
        Ok(())
    }

    /// Permanent horizon expressed in days.
    pub fn permanent_horizon_days(&self) -> i64 {
        self.permanent_horizon_years.saturating_mul(365)
    }
}
