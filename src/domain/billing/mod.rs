//! Billing domain.
//!
//! Pure billing rules: pricing, lifecycle classification, due dates, ledger
//! attempts and audit events. No I/O happens here; the application layer
//! drives these types through ports.

mod account;
mod attempt;
mod audit;
mod charge;
pub mod due_date;
mod errors;
mod policy;
mod state;

pub use account::{validate_pack_count, BillingAccount};
pub use attempt::{AttemptStatus, BillingPeriod, ChargeAttempt, ChargeKind};
pub use audit::AuditEvent;
pub use charge::{format_bytes, ChargeQuote, LineItem, LineItemKind, PricingPolicy};
pub use due_date::DueDate;
pub use errors::BillingError;
pub use policy::BillingPolicy;
pub use state::BillingState;
