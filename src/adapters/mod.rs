//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the billing engine to external systems:
//! - `memory` - In-memory implementations of every port
//! - `postgres` - PostgreSQL persistence
//! - `stripe` - Stripe payment processor and a scripted mock

pub mod memory;
pub mod postgres;
pub mod stripe;
