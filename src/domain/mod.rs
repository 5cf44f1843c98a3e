//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machines)
//! - `billing` - Pricing, lifecycle classification, due dates, ledger attempts
//! - `workspace` - Memberships, restricted mode and the cascade rule
//! - `reminder` - Payment reminder rules

pub mod billing;
pub mod foundation;
pub mod reminder;
pub mod workspace;
