//! Application layer - Commands, Queries, Handlers and the sweep services.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Handlers serve the user-initiated operations; services run inside the
//! nightly sweep.

pub mod handlers;
pub mod services;

mod context;
#[cfg(test)]
mod test_support;

pub use context::{BillingContext, EngineSettings};
pub use services::{NightlySweep, SweepSummary};
