//! Billing engine configuration
//!
//! Pricing, lifecycle windows and sweep tunables. Every default matches
//! the production values.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::EngineSettings;
use crate::domain::billing::{BillingPolicy, PricingPolicy};
use crate::domain::reminder::ReminderPolicy;

const GIB: u64 = 1024 * 1024 * 1024;

/// Billing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Fixed fee per billing cycle, minor units
    #[serde(default = "default_base_fee")]
    pub base_fee_cents: i64,

    /// Fee per extra usage pack per cycle
    #[serde(default = "default_pack_fee")]
    pub pack_fee_cents: i64,

    /// Granularity of usage packs
    #[serde(default = "default_pack_size")]
    pub pack_size_bytes: u64,

    /// Usage covered by the base fee
    #[serde(default = "default_free_allowance")]
    pub free_allowance_bytes: u64,

    /// Upper bound for a reserved pack count
    #[serde(default = "default_max_packs")]
    pub max_packs: u32,

    /// ISO currency code passed to the processor
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_trial_days")]
    pub trial_days: i64,

    #[serde(default = "default_cycle_days")]
    pub cycle_days: i64,

    /// Consecutive failed charges that terminate an account
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_restricted_mode_days")]
    pub restricted_mode_days: i64,

    /// How early before the due date "pay now" is accepted
    #[serde(default = "default_pay_early_window")]
    pub pay_early_window_days: u32,

    /// Days-until-due values that trigger a reminder (comma-separated in env)
    #[serde(default = "default_reminder_offsets")]
    pub reminder_offsets_days: Vec<u32>,

    /// Subscribed accounts further out than this get no reminder
    #[serde(default = "default_reminder_horizon")]
    pub reminder_horizon_days: u32,

    /// End dates beyond now + this many years mark a permanent account
    #[serde(default = "default_permanent_horizon")]
    pub permanent_horizon_years: i64,

    /// Bound on every payment processor call
    #[serde(default = "default_processor_timeout")]
    pub processor_timeout_ms: u64,

    /// Age after which a pending attempt is reconciled
    #[serde(default = "default_pending_grace")]
    pub pending_grace_secs: u64,
}

impl BillingConfig {
    /// Build the domain billing policy
    pub fn policy(&self) -> BillingPolicy {
        BillingPolicy {
            pricing: PricingPolicy {
                base_fee_cents: self.base_fee_cents,
                pack_fee_cents: self.pack_fee_cents,
                pack_size_bytes: self.pack_size_bytes,
                free_allowance_bytes: self.free_allowance_bytes,
            },
            currency: self.currency.to_lowercase(),
            max_packs: self.max_packs,
            trial_days: self.trial_days,
            cycle_days: self.cycle_days,
            failure_threshold: self.failure_threshold,
            restricted_mode_days: self.restricted_mode_days,
            pay_early_window_days: self.pay_early_window_days,
            permanent_horizon_years: self.permanent_horizon_years,
        }
    }

    pub fn reminder_policy(&self) -> ReminderPolicy {
        ReminderPolicy {
            offsets_days: self.reminder_offsets_days.clone(),
            horizon_days: self.reminder_horizon_days,
        }
    }

    /// Get processor timeout as Duration
    pub fn processor_timeout(&self) -> Duration {
        Duration::from_millis(self.processor_timeout_ms)
    }

    /// Get pending grace period as Duration
    pub fn pending_grace(&self) -> Duration {
        Duration::from_secs(self.pending_grace_secs)
    }

    /// Settings consumed by the billing engine
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            policy: self.policy(),
            reminders: self.reminder_policy(),
            processor_timeout: self.processor_timeout(),
            pending_grace: self.pending_grace(),
        }
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.policy()
            .validate()
            .map_err(|e| ValidationError::InvalidBillingPolicy(e.to_string()))?;
        if self.max_packs == 0 {
            return Err(ValidationError::InvalidBillingPolicy(
                "max_packs must be at least 1".to_string(),
            ));
        }
        if self.reminder_offsets_days.is_empty() {
            return Err(ValidationError::InvalidBillingPolicy(
                "reminder_offsets_days must not be empty".to_string(),
            ));
        }
        if self.processor_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        // A pending row younger than the processor timeout may still be in flight.
        if self.pending_grace() < self.processor_timeout() {
            return Err(ValidationError::InvalidBillingPolicy(
                "pending_grace_secs must cover processor_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            base_fee_cents: default_base_fee(),
            pack_fee_cents: default_pack_fee(),
            pack_size_bytes: default_pack_size(),
            free_allowance_bytes: default_free_allowance(),
            max_packs: default_max_packs(),
            currency: default_currency(),
            trial_days: default_trial_days(),
            cycle_days: default_cycle_days(),
            failure_threshold: default_failure_threshold(),
            restricted_mode_days: default_restricted_mode_days(),
            pay_early_window_days: default_pay_early_window(),
            reminder_offsets_days: default_reminder_offsets(),
            reminder_horizon_days: default_reminder_horizon(),
            permanent_horizon_years: default_permanent_horizon(),
            processor_timeout_ms: default_processor_timeout(),
            pending_grace_secs: default_pending_grace(),
        }
    }
}

fn default_base_fee() -> i64 {
    300
}

fn default_pack_fee() -> i64 {
    100
}

fn default_pack_size() -> u64 {
    50 * GIB
}

fn default_free_allowance() -> u64 {
    5 * GIB
}

fn default_max_packs() -> u32 {
    100
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_trial_days() -> i64 {
    20
}

fn default_cycle_days() -> i64 {
    30
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_restricted_mode_days() -> i64 {
    30
}

fn default_pay_early_window() -> u32 {
    7
}

fn default_reminder_offsets() -> Vec<u32> {
    vec![5, 1]
}

fn default_reminder_horizon() -> u32 {
    7
}

fn default_permanent_horizon() -> i64 {
    50
}

fn default_processor_timeout() -> u64 {
    30_000
}

fn default_pending_grace() -> u64 {
    900
}
