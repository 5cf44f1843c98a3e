//! Stripe API objects.
//!
//! Only the fields the billing engine reads are modelled; everything else in
//! the Stripe JSON is ignored.

use serde::{Deserialize, Serialize};

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Stripe payment method object (cards only).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentMethod {
    pub id: String,
    #[serde(default)]
    pub card: Option<StripeCard>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCard {
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
}

/// Stripe PaymentIntent object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: i64,
    #[serde(default)]
    pub last_payment_error: Option<StripeApiError>,
}

/// Result page of a Stripe search endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSearchResult<T> {
    pub data: Vec<T>,
}

/// Error envelope returned on non-2xx responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeErrorEnvelope {
    pub error: StripeApiError,
}

/// Stripe error object.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub decline_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StripeApiError {
    /// Most specific reason available, for ledger and audit text.
    pub fn reason(&self) -> String {
        self.decline_code
            .clone()
            .or_else(|| self.code.clone())
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| self.error_type.clone())
    }

    pub fn is_card_error(&self) -> bool {
        self.error_type == "card_error"
    }
}
