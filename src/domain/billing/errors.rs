//! Billing-specific error types.
//!
//! Errors related to subscription lifecycle, collection and payment methods.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | NoPaymentMethod | 402 |
//! | ProcessorDeclined | 402 |
//! | ProcessorTransient | 503 |
//! | AlreadyScheduledForCancellation | 409 |
//! | NotEligibleToReactivate | 409 |
//! | PayNowNotPermitted | 409 |
//! | AlreadySettled | 409 |
//! | InvalidState | 409 |
//! | AccountNotFound | 404 |
//! | Infrastructure | 500 |

use thiserror::Error;

use crate::domain::foundation::{AccountId, DomainError, ErrorCode, ValidationError};

/// Billing engine errors surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    /// Input rejected before any ledger write.
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    /// No saved payment method to charge.
    #[error("Account {0} has no saved payment method")]
    NoPaymentMethod(AccountId),

    /// The processor declined the charge.
    #[error("Payment declined: {reason}")]
    ProcessorDeclined { reason: String },

    /// Timeout or transport failure talking to the processor.
    #[error("Payment processor unavailable: {reason}")]
    ProcessorTransient { reason: String },

    #[error("Subscription is already scheduled for cancellation")]
    AlreadyScheduledForCancellation,

    #[error("Subscription can no longer be reactivated; start a new subscription")]
    NotEligibleToReactivate,

    /// Paying early outside the allowed window.
    #[error("Payment is not due yet ({days_until_due} days remaining)")]
    PayNowNotPermitted { days_until_due: u32 },

    /// The billing period was already paid or has a charge in flight.
    #[error("Billing period is already settled or in progress")]
    AlreadySettled,

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Cannot {attempted} while account is {current}")]
    InvalidState { current: String, attempted: String },

    #[error("Internal error: {0}")]
    Infrastructure(String),
}

impl BillingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        BillingError::ProcessorDeclined {
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        BillingError::ProcessorTransient {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        BillingError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BillingError::Validation { .. } => ErrorCode::ValidationFailed,
            BillingError::NoPaymentMethod(_) => ErrorCode::NoPaymentMethod,
            BillingError::ProcessorDeclined { .. } => ErrorCode::PaymentRequired,
            BillingError::ProcessorTransient { .. } => ErrorCode::ExternalServiceError,
            BillingError::AlreadyScheduledForCancellation => {
                ErrorCode::AlreadyScheduledForCancellation
            }
            BillingError::NotEligibleToReactivate => ErrorCode::NotEligibleToReactivate,
            BillingError::PayNowNotPermitted { .. } => ErrorCode::PayNowNotPermitted,
            BillingError::AlreadySettled => ErrorCode::LedgerConflict,
            BillingError::AccountNotFound(_) => ErrorCode::AccountNotFound,
            BillingError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            BillingError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns true for failures that a later run may resolve on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::ProcessorTransient { .. } | BillingError::Infrastructure(_)
        )
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => BillingError::Validation {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            ErrorCode::LedgerConflict => BillingError::AlreadySettled,
            ErrorCode::InvalidStateTransition => BillingError::InvalidState {
                current: err.details.get("current").cloned().unwrap_or_default(),
                attempted: err.message,
            },
            _ => BillingError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::from(DomainError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_kinds() {
        assert_eq!(
            BillingError::declined("card_declined").code(),
            ErrorCode::PaymentRequired
        );
        assert_eq!(
            BillingError::NoPaymentMethod(AccountId::new()).code(),
            ErrorCode::NoPaymentMethod
        );
        assert_eq!(
            BillingError::AlreadyScheduledForCancellation.code(),
            ErrorCode::AlreadyScheduledForCancellation
        );
    }

    #[test]
    fn transient_and_infrastructure_are_retryable() {
        assert!(BillingError::transient("timeout").is_retryable());
        assert!(BillingError::infrastructure("db down").is_retryable());
        assert!(!BillingError::declined("insufficient_funds").is_retryable());
        assert!(!BillingError::NotEligibleToReactivate.is_retryable());
    }

    #[test]
    fn ledger_conflict_maps_to_already_settled() {
        let err: BillingError = DomainError::new(ErrorCode::LedgerConflict, "dup").into();
        assert_eq!(err, BillingError::AlreadySettled);
    }

    #[test]
    fn database_errors_map_to_infrastructure() {
        let err: BillingError = DomainError::database("connection reset").into();
        assert!(matches!(
            err,
            BillingError::Infrastructure(msg) if msg.contains("connection reset")
        ));
    }

    #[test]
    fn validation_error_keeps_field() {
        let err: BillingError = ValidationError::out_of_range("pack_count", 0, 100, 101).into();
        assert!(matches!(err, BillingError::Validation { field, .. } if field == "pack_count"));
    }

    #[test]
    fn display_includes_reason() {
        let err = BillingError::declined("insufficient_funds");
        assert_eq!(err.to_string(), "Payment declined: insufficient_funds");
    }
}
