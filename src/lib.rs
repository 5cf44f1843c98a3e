//! Hearth Billing - Billing and entitlement-consistency engine
//!
//! Charges accounts for a fixed base fee plus metered storage packs, runs
//! dunning through a nightly sweep, and keeps shared workspaces consistent
//! when a paying member's billing relationship ends.
//!
//! The crate is laid out hexagonally: pure rules in `domain`, contracts in
//! `ports`, infrastructure in `adapters`, orchestration in `application`.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
