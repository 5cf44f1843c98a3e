//! SavePaymentMethodHandler - Command handler for storing a card.

use crate::application::BillingContext;
use crate::domain::billing::{AuditEvent, BillingError};
use crate::domain::foundation::AccountId;
use crate::ports::{PaymentError, PaymentErrorCode, PaymentMethodDetails};

/// Command to save a tokenized payment method.
#[derive(Debug, Clone)]
pub struct SavePaymentMethodCommand {
    pub account_id: AccountId,
    /// Token produced by the processor's client-side library.
    pub method_token: String,
}

/// Handler for saving payment methods.
///
/// Creates the processor customer on first use, attaches the method, and
/// stores both references on the account. A later save replaces the method.
pub struct SavePaymentMethodHandler {
    ctx: BillingContext,
}

impl SavePaymentMethodHandler {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        cmd: SavePaymentMethodCommand,
    ) -> Result<PaymentMethodDetails, BillingError> {
        let token = cmd.method_token.trim();
        if token.is_empty() {
            return Err(BillingError::validation("method_token", "must not be empty"));
        }

        let now = self.ctx.clock.now();
        let mut account = self.ctx.load_account(&cmd.account_id).await?;
        let processor = &self.ctx.processor;

        // 1. Customer
        let customer_id = match account.processor_customer_id.clone() {
            Some(id) => id,
            None => {
                let id = self
                    .ctx
                    .call_processor(processor.create_customer(&account.id))
                    .await
                    .map_err(payment_failure)?;
                tracing::info!(
                    account_id = %account.id,
                    customer_id = %id,
                    "Processor customer created"
                );
                id
            }
        };

        // 2. Attach and inspect
        let method_id = self
            .ctx
            .call_processor(processor.attach_payment_method(&customer_id, token))
            .await
            .map_err(payment_failure)?;
        let details = self
            .ctx
            .call_processor(processor.get_payment_method(&method_id))
            .await
            .map_err(payment_failure)?;

        // 3. Persist
        account.set_payment_method(customer_id, method_id, now);
        self.ctx.accounts.update(&account).await?;

        tracing::info!(
            account_id = %account.id,
            brand = %details.brand,
            last4 = %details.last4,
            "Payment method saved"
        );
        self.ctx
            .record_audit(AuditEvent::PaymentMethodSaved {
                account_id: account.id,
                brand: details.brand.clone(),
                last4: details.last4.clone(),
                occurred_at: now,
            })
            .await;

        Ok(details)
    }
}

fn payment_failure(err: PaymentError) -> BillingError {
    match err.code {
        PaymentErrorCode::InvalidCard => BillingError::validation("method_token", err.message),
        _ => BillingError::transient(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::TestStack;

    fn cmd(account_id: AccountId, token: &str) -> SavePaymentMethodCommand {
        SavePaymentMethodCommand {
            account_id,
            method_token: token.to_string(),
        }
    }

    #[tokio::test]
    async fn first_save_creates_customer_and_stores_references() {
        let stack = TestStack::new();
        let id = stack.trial_account().await;

        let details = SavePaymentMethodHandler::new(stack.context())
            .handle(cmd(id, "tok_visa"))
            .await
            .unwrap();

        let account = stack.account(&id).await;
        assert!(account.processor_customer_id.is_some());
        assert_eq!(account.payment_method_id.as_deref(), Some(details.id.as_str()));
        assert_eq!(stack.processor.call_count("create_customer"), 1);
        assert_eq!(stack.audit.count("billing.payment_method_saved").await, 1);
    }

    #[tokio::test]
    async fn existing_customer_is_reused() {
        let stack = TestStack::new();
        let id = stack.trial_account_with_card().await;

        SavePaymentMethodHandler::new(stack.context())
            .handle(cmd(id, "tok_mastercard"))
            .await
            .unwrap();

        let account = stack.account(&id).await;
        assert_eq!(account.processor_customer_id.as_deref(), Some("cus_test"));
        assert_ne!(account.payment_method_id.as_deref(), Some("pm_test"));
        assert_eq!(stack.processor.call_count("create_customer"), 0);
    }

    #[tokio::test]
    async fn blank_token_is_rejected_without_processor_calls() {
        let stack = TestStack::new();
        let id = stack.trial_account().await;

        let err = SavePaymentMethodHandler::new(stack.context())
            .handle(cmd(id, "  "))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BillingError::Validation { ref field, .. } if field == "method_token"
        ));
        assert!(stack.processor.calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_card_is_a_validation_error() {
        let stack = TestStack::new();
        let id = stack.trial_account().await;
        stack
            .processor
            .set_method_error("attach_payment_method", PaymentError::invalid_card("card expired"));

        let err = SavePaymentMethodHandler::new(stack.context())
            .handle(cmd(id, "tok_expired"))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Validation { .. }));
        assert!(stack.account(&id).await.payment_method_id.is_none());
    }

    #[tokio::test]
    async fn processor_outage_is_transient() {
        let stack = TestStack::new();
        let id = stack.trial_account().await;
        stack
            .processor
            .set_method_error("create_customer", PaymentError::network("connection reset"));

        let err = SavePaymentMethodHandler::new(stack.context())
            .handle(cmd(id, "tok_visa"))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
