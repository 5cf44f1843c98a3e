//! Billing engine services.
//!
//! Stateless workers over a `BillingContext`. The nightly sweep composes
//! them; the command handlers reuse the charge executor and aggregator.

mod cascade;
mod charge_executor;
pub(crate) mod collection;
mod reconciliation;
mod reminders;
mod sweep;
mod usage_aggregator;

pub use cascade::{CascadeEnforcer, CascadeReport};
pub use charge_executor::{ChargeExecutor, ChargeResult};
pub use collection::{CollectionOutcome, CollectionService, FailureOutcome, SkipReason};
pub use reconciliation::{ReconciliationReport, ReconciliationService, Resolution};
pub use reminders::{ReminderReport, ReminderScheduler};
pub use sweep::{NightlySweep, SweepSummary};
pub use usage_aggregator::UsageAggregator;
