//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the billing domain and the outside world. Adapters implement these ports.
//!
//! ## Owned by the engine
//!
//! - `BillingAccountRepository` - Billing account persistence
//! - `BillingLedger` - Append-only charge attempt log
//! - `ReminderStore` - One-reminder-per-day claims
//!
//! ## External collaborators
//!
//! - `MembershipStore` - Elevated holders and per-workspace cascade transactions
//! - `UsageStore` - Metered bytes per workspace
//! - `PaymentProcessor` - Customers, methods, idempotent charges
//! - `AuditLog` - Audit trail
//! - `ReminderNotifier` - Reminder delivery
//! - `Clock` - Current time

mod audit_log;
mod billing_account_repository;
mod billing_ledger;
mod clock;
mod membership_store;
mod payment_processor;
mod reminder_notifier;
mod reminder_store;
mod usage_store;

pub use audit_log::AuditLog;
pub use billing_account_repository::BillingAccountRepository;
pub use billing_ledger::BillingLedger;
pub use clock::{Clock, SystemClock};
pub use membership_store::{MembershipStore, WorkspaceTransaction};
pub use payment_processor::{
    ChargeOutcome, ChargeRequest, PaymentError, PaymentErrorCode, PaymentMethodDetails,
    PaymentProcessor,
};
pub use reminder_notifier::{PaymentReminder, ReminderNotifier};
pub use reminder_store::ReminderStore;
pub use usage_store::UsageStore;
