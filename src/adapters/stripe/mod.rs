//! Payment processor adapters.
//!
//! - `StripePaymentAdapter` - Stripe PaymentIntents over the REST API
//! - `MockPaymentProcessor` - Scriptable processor for tests
//!
//! # Security
//!
//! The Stripe secret key is held in `secrecy::SecretString` and only exposed
//! when building the basic-auth header.

mod mock_payment_processor;
mod stripe_adapter;
mod types;

pub use mock_payment_processor::{MethodCall, MockPaymentProcessor, ScriptedCharge};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use types::{
    StripeApiError, StripeCard, StripeCustomer, StripeErrorEnvelope, StripePaymentIntent,
    StripePaymentMethod, StripeSearchResult,
};
