//! Payment processor port.
//!
//! The engine does not implement a payment gateway; it defines the contract
//! it needs from one: customers, saved payment methods, idempotent charges
//! and charge lookup for reconciliation.
//!
//! # Design
//!
//! - **Gateway agnostic**: Stripe and the test mock both implement this
//! - **Idempotent**: every charge carries a stable idempotency key
//! - **Declines are outcomes**: a declined card is `Ok(ChargeOutcome::Declined)`;
//!   `Err(PaymentError)` means the processor could not be asked

use crate::domain::foundation::{AccountId, DomainError, ErrorCode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for payment processor integrations.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a customer in the processor.
    ///
    /// Returns the processor's customer ID.
    async fn create_customer(&self, account_id: &AccountId) -> Result<String, PaymentError>;

    /// Attach a tokenized payment method to a customer.
    ///
    /// Returns the processor's payment method ID.
    async fn attach_payment_method(
        &self,
        customer_id: &str,
        method_token: &str,
    ) -> Result<String, PaymentError>;

    /// Charge a saved payment method.
    ///
    /// Repeating a request with the same idempotency key must not charge twice.
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, PaymentError>;

    /// Inspect a saved payment method.
    async fn get_payment_method(
        &self,
        method_id: &str,
    ) -> Result<PaymentMethodDetails, PaymentError>;

    /// Look up the outcome of an earlier charge by idempotency key.
    ///
    /// Returns `None` if the processor never received the charge.
    async fn lookup_charge(&self, idempotency_key: &str)
        -> Result<Option<ChargeOutcome>, PaymentError>;
}

/// Request to charge a saved method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub customer_id: String,
    pub method_id: String,

    /// Amount in minor currency units.
    pub amount_cents: i64,

    pub currency: String,

    /// Stable key derived from the ledger attempt.
    pub idempotency_key: String,

    pub description: String,
}

/// Result of a charge the processor received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChargeOutcome {
    Succeeded { reference: String },
    Declined { reason: String },
}

/// Card details shown to the account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodDetails {
    pub id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
}

/// Errors from payment processor operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Processor's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Create with provider code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::Timeout, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::AuthenticationError, message)
    }

    /// Create an invalid card error.
    pub fn invalid_card(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidCard, message)
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Create a provider API error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = match err.code {
            PaymentErrorCode::InvalidCard => ErrorCode::ValidationFailed,
            _ => ErrorCode::ExternalServiceError,
        };
        DomainError::new(code, err.message).with_detail("payment_code", err.code.to_string())
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// The call exceeded its time budget.
    Timeout,

    /// API authentication failed.
    AuthenticationError,

    /// Invalid card details or token.
    InvalidCard,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Provider API error.
    ProviderError,

    /// Unknown error.
    Unknown,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::Timeout
                | PaymentErrorCode::RateLimitExceeded
                | PaymentErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::Timeout => "timeout",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::InvalidCard => "invalid_card",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
