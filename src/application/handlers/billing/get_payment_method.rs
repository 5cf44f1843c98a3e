//! GetPaymentMethodHandler - Query handler for the saved card.

use crate::application::BillingContext;
use crate::domain::billing::BillingError;
use crate::domain::foundation::AccountId;
use crate::ports::PaymentMethodDetails;

#[derive(Debug, Clone)]
pub struct GetPaymentMethodQuery {
    pub account_id: AccountId,
}

/// Returns brand, last four digits and expiry of the saved method.
pub struct GetPaymentMethodHandler {
    ctx: BillingContext,
}

impl GetPaymentMethodHandler {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    pub async fn handle(
        &self,
        query: GetPaymentMethodQuery,
    ) -> Result<PaymentMethodDetails, BillingError> {
        let account = self.ctx.load_account(&query.account_id).await?;
        let (_, method_id) = account
            .payment_references()
            .ok_or(BillingError::NoPaymentMethod(account.id))?;

        self.ctx
            .call_processor(self.ctx.processor.get_payment_method(method_id))
            .await
            .map_err(|e| BillingError::transient(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::{
        SavePaymentMethodCommand, SavePaymentMethodHandler,
    };
    use crate::application::test_support::TestStack;

    #[tokio::test]
    async fn returns_saved_card_details() {
        let stack = TestStack::new();
        let id = stack.trial_account().await;
        SavePaymentMethodHandler::new(stack.context())
            .handle(SavePaymentMethodCommand {
                account_id: id,
                method_token: "tok_visa".to_string(),
            })
            .await
            .unwrap();

        let details = GetPaymentMethodHandler::new(stack.context())
            .handle(GetPaymentMethodQuery { account_id: id })
            .await
            .unwrap();

        assert_eq!(details.brand, "visa");
        assert_eq!(details.last4, "4242");
        assert_eq!((details.exp_month, details.exp_year), (12, 2030));
    }

    #[tokio::test]
    async fn account_without_method_is_rejected() {
        let stack = TestStack::new();
        let id = stack.trial_account().await;

        let err = GetPaymentMethodHandler::new(stack.context())
            .handle(GetPaymentMethodQuery { account_id: id })
            .await
            .unwrap_err();

        assert_eq!(err, BillingError::NoPaymentMethod(id));
    }
}
