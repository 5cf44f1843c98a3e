//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod billing;

pub use billing::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
    ComputeInvoiceHandler, ComputeInvoiceQuery, GetBillingHistoryHandler, GetBillingHistoryQuery,
    GetBillingHistoryResult, GetPaymentMethodHandler, GetPaymentMethodQuery, InvoiceView,
    PayNowCommand, PayNowHandler, PayNowResult, ReactivateSubscriptionCommand,
    ReactivateSubscriptionHandler, SavePaymentMethodCommand, SavePaymentMethodHandler,
    StartSubscriptionCommand, StartSubscriptionHandler, StartSubscriptionResult,
    UpdatePacksCommand, UpdatePacksHandler, UpdatePacksResult,
};
