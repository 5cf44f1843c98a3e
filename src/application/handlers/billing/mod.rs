//! Billing handlers.
//!
//! Command and query handlers for the operations the API layer exposes:
//!
//! ## Commands
//! - Starting a subscription (first charge)
//! - Paying the next obligation early
//! - Changing reserved usage packs
//! - Scheduling and withdrawing cancellation
//! - Saving a payment method
//!
//! ## Queries
//! - Computing the upcoming invoice
//! - Reading the saved payment method
//! - Billing history

mod cancel_subscription;
mod compute_invoice;
mod get_billing_history;
mod get_payment_method;
mod pay_now;
mod reactivate_subscription;
mod save_payment_method;
mod start_subscription;
mod update_packs;

// Commands
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use pay_now::{PayNowCommand, PayNowHandler, PayNowResult};
pub use reactivate_subscription::{ReactivateSubscriptionCommand, ReactivateSubscriptionHandler};
pub use save_payment_method::{SavePaymentMethodCommand, SavePaymentMethodHandler};
pub use start_subscription::{
    StartSubscriptionCommand, StartSubscriptionHandler, StartSubscriptionResult,
};
pub use update_packs::{UpdatePacksCommand, UpdatePacksHandler, UpdatePacksResult};

// Queries
pub use compute_invoice::{ComputeInvoiceHandler, ComputeInvoiceQuery, InvoiceView};
pub use get_billing_history::{
    GetBillingHistoryHandler, GetBillingHistoryQuery, GetBillingHistoryResult,
};
pub use get_payment_method::{GetPaymentMethodHandler, GetPaymentMethodQuery};
