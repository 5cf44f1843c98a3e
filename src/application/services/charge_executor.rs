//! Executes one charge attempt against the payment processor.
//!
//! The attempt is written to the ledger as `pending` before the processor is
//! contacted, and its ID is the processor idempotency key. The processor call
//! is bounded by `processor_timeout`; a timeout or transport error leaves the
//! row pending for reconciliation.

use crate::application::BillingContext;
use crate::domain::billing::{BillingAccount, BillingError, ChargeAttempt};
use crate::domain::foundation::Timestamp;
use crate::ports::{ChargeOutcome, ChargeRequest};

/// Result of one processor round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeResult {
    /// Ledger row marked succeeded.
    Succeeded {
        attempt: ChargeAttempt,
        reference: String,
    },

    /// Ledger row marked failed.
    Declined {
        attempt: ChargeAttempt,
        reason: String,
    },

    /// No answer from the processor. Ledger row still pending.
    Unresolved {
        attempt: ChargeAttempt,
        reason: String,
    },
}

impl ChargeResult {
    pub fn attempt(&self) -> &ChargeAttempt {
        match self {
            ChargeResult::Succeeded { attempt, .. }
            | ChargeResult::Declined { attempt, .. }
            | ChargeResult::Unresolved { attempt, .. } => attempt,
        }
    }
}

pub struct ChargeExecutor {
    ctx: BillingContext,
}

impl ChargeExecutor {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Records `attempt` as pending and charges the account's saved method.
    ///
    /// # Errors
    ///
    /// - `NoPaymentMethod` before anything is written
    /// - `AlreadySettled` if the period already has a pending or succeeded row
    /// - `Infrastructure` if the ledger cannot be written
    pub async fn execute(
        &self,
        account: &BillingAccount,
        mut attempt: ChargeAttempt,
        now: Timestamp,
    ) -> Result<ChargeResult, BillingError> {
        let (customer_id, method_id) = account
            .payment_references()
            .ok_or(BillingError::NoPaymentMethod(account.id))?;

        self.ctx.ledger.record_pending(&attempt).await?;

        let request = ChargeRequest {
            customer_id: customer_id.to_string(),
            method_id: method_id.to_string(),
            amount_cents: attempt.amount_cents,
            currency: attempt.currency.clone(),
            idempotency_key: attempt.idempotency_key(),
            description: attempt.description.clone(),
        };

        tracing::info!(
            account_id = %account.id,
            attempt_id = %attempt.id,
            kind = attempt.kind.as_str(),
            amount_cents = attempt.amount_cents,
            "Charging account"
        );

        let timeout = self.ctx.settings.processor_timeout;
        let response = tokio::time::timeout(timeout, self.ctx.processor.charge(request)).await;

        match response {
            Ok(Ok(ChargeOutcome::Succeeded { reference })) => {
                self.ctx
                    .ledger
                    .mark_succeeded(&attempt.id, &reference, now)
                    .await?;
                attempt.succeed(reference.clone(), now)?;
                tracing::info!(
                    account_id = %account.id,
                    attempt_id = %attempt.id,
                    processor_reference = %reference,
                    "Charge succeeded"
                );
                Ok(ChargeResult::Succeeded { attempt, reference })
            }
            Ok(Ok(ChargeOutcome::Declined { reason })) => {
                self.ctx.ledger.mark_failed(&attempt.id, &reason, now).await?;
                attempt.fail(reason.clone(), now)?;
                tracing::warn!(
                    account_id = %account.id,
                    attempt_id = %attempt.id,
                    reason = %reason,
                    "Charge declined"
                );
                Ok(ChargeResult::Declined { attempt, reason })
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    account_id = %account.id,
                    attempt_id = %attempt.id,
                    error = %e,
                    "Payment processor unavailable; attempt left pending"
                );
                Ok(ChargeResult::Unresolved {
                    attempt,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                tracing::warn!(
                    account_id = %account.id,
                    attempt_id = %attempt.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Payment processor timed out; attempt left pending"
                );
                Ok(ChargeResult::Unresolved {
                    attempt,
                    reason: format!("processor timed out after {} ms", timeout.as_millis()),
                })
            }
        }
    }
}
