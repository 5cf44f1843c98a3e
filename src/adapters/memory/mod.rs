//! In-memory adapters for every port.
//!
//! Used by tests and local runs. State lives behind `tokio::sync` locks so
//! nothing here can poison.

mod account_repository;
mod audit_log;
mod clock;
mod ledger;
mod membership_store;
mod reminder_store;
mod usage_store;

pub use account_repository::InMemoryBillingAccountRepository;
pub use audit_log::{InMemoryAuditLog, RecordingNotifier};
pub use clock::ManualClock;
pub use ledger::InMemoryBillingLedger;
pub use membership_store::InMemoryMembershipStore;
pub use reminder_store::InMemoryReminderStore;
pub use usage_store::InMemoryUsageStore;
