//! Mock payment processor for testing.
//!
//! Provides a configurable implementation of `PaymentProcessor` for unit
//! and scenario tests. Supports:
//! - Scripted charge outcomes (per customer, one-shot queue, default)
//! - Processor-side idempotency by key, like the real processor
//! - Simulated hangs for timeout and reconciliation paths
//! - Error injection and call tracking
//!
//! # Panics
//!
//! Methods panic if the internal mutex was poisoned by a panicking test.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::AccountId;
use crate::ports::{
    ChargeOutcome, ChargeRequest, PaymentError, PaymentMethodDetails, PaymentProcessor,
};

/// How the mock answers a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedCharge {
    Succeed,
    Decline(String),
    /// Transport failure before the processor saw the charge.
    Transient(String),
    /// Sleep, then succeed. A caller timeout leaves nothing recorded.
    Hang(Duration),
    /// Record a success, then sleep. The caller never sees the response.
    AcceptThenHang(Duration),
}

/// Mock payment processor for testing.
///
/// # Example
///
/// ```ignore
/// let processor = MockPaymentProcessor::new();
/// processor.set_customer_behavior("cus_mock_1", ScriptedCharge::Decline("card_declined".into()));
/// processor.push_charge(ScriptedCharge::Transient("connection reset".into()));
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentProcessor {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    next_id: u64,

    methods: HashMap<String, PaymentMethodDetails>,

    /// Charges the processor received, by idempotency key.
    charges: HashMap<String, (ChargeRequest, ChargeOutcome)>,

    /// Order in which new charges were processed.
    charge_order: Vec<String>,

    customer_behavior: HashMap<String, ScriptedCharge>,

    queued: VecDeque<ScriptedCharge>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Answer every charge for `customer_id` this way until changed.
    pub fn set_customer_behavior(&self, customer_id: &str, behavior: ScriptedCharge) {
        self.inner
            .lock()
            .unwrap()
            .customer_behavior
            .insert(customer_id.to_string(), behavior);
    }

    pub fn clear_customer_behavior(&self, customer_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .customer_behavior
            .remove(customer_id);
    }

    /// Answer the next charge (without a customer behavior) this way.
    pub fn push_charge(&self, behavior: ScriptedCharge) {
        self.inner.lock().unwrap().queued.push_back(behavior);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.inner.lock().unwrap().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().unwrap().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Distinct charges the processor actually processed.
    pub fn processed_charges(&self) -> Vec<(ChargeRequest, ChargeOutcome)> {
        let state = self.inner.lock().unwrap();
        state
            .charge_order
            .iter()
            .filter_map(|key| state.charges.get(key).cloned())
            .collect()
    }

    /// Successful charges for one customer.
    pub fn successful_charges_for(&self, customer_id: &str) -> Vec<ChargeRequest> {
        self.processed_charges()
            .into_iter()
            .filter(|(req, outcome)| {
                req.customer_id == customer_id
                    && matches!(outcome, ChargeOutcome::Succeeded { .. })
            })
            .map(|(req, _)| req)
            .collect()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.inner.lock().unwrap().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        match self.inner.lock().unwrap().method_errors.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.inner.lock().unwrap();
        state.next_id += 1;
        format!("{}_mock_{}", prefix, state.next_id)
    }

    fn behavior_for(&self, customer_id: &str) -> ScriptedCharge {
        let mut state = self.inner.lock().unwrap();
        if let Some(behavior) = state.customer_behavior.get(customer_id) {
            return behavior.clone();
        }
        state.queued.pop_front().unwrap_or(ScriptedCharge::Succeed)
    }

    fn store_charge(&self, request: &ChargeRequest, outcome: &ChargeOutcome) {
        let mut state = self.inner.lock().unwrap();
        let key = request.idempotency_key.clone();
        state.charge_order.push(key.clone());
        state.charges.insert(key, (request.clone(), outcome.clone()));
    }

    fn reference_for(&self, request: &ChargeRequest) -> ChargeOutcome {
        ChargeOutcome::Succeeded {
            reference: format!("pi_mock_{}", request.idempotency_key),
        }
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_customer(&self, account_id: &AccountId) -> Result<String, PaymentError> {
        self.record_call("create_customer", vec![account_id.to_string()]);
        self.check_error("create_customer")?;
        Ok(self.next_id("cus"))
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        method_token: &str,
    ) -> Result<String, PaymentError> {
        self.record_call(
            "attach_payment_method",
            vec![customer_id.to_string(), method_token.to_string()],
        );
        self.check_error("attach_payment_method")?;

        if method_token.starts_with("tok_invalid") {
            return Err(PaymentError::invalid_card("Your card number is incorrect")
                .with_provider_code("incorrect_number"));
        }

        let (brand, last4) = match method_token {
            "tok_visa" => ("visa".to_string(), "4242".to_string()),
            "tok_mastercard" => ("mastercard".to_string(), "4444".to_string()),
            other => {
                let start = other.len().saturating_sub(4);
                let tail = other.get(start..).unwrap_or(other).to_string();
                ("card".to_string(), tail)
            }
        };
        let id = self.next_id("pm");
        self.inner.lock().unwrap().methods.insert(
            id.clone(),
            PaymentMethodDetails {
                id: id.clone(),
                brand,
                last4,
                exp_month: 12,
                exp_year: 2030,
            },
        );
        Ok(id)
    }

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, PaymentError> {
        self.record_call(
            "charge",
            vec![
                request.customer_id.clone(),
                request.amount_cents.to_string(),
                request.idempotency_key.clone(),
            ],
        );
        self.check_error("charge")?;

        let replay = self
            .inner
            .lock()
            .unwrap()
            .charges
            .get(&request.idempotency_key)
            .map(|(_, outcome)| outcome.clone());
        if let Some(outcome) = replay {
            return Ok(outcome);
        }

        match self.behavior_for(&request.customer_id) {
            ScriptedCharge::Succeed => {
                let outcome = self.reference_for(&request);
                self.store_charge(&request, &outcome);
                Ok(outcome)
            }
            ScriptedCharge::Decline(reason) => {
                let outcome = ChargeOutcome::Declined { reason };
                self.store_charge(&request, &outcome);
                Ok(outcome)
            }
            ScriptedCharge::Transient(reason) => Err(PaymentError::network(reason)),
            ScriptedCharge::Hang(duration) => {
                tokio::time::sleep(duration).await;
                let outcome = self.reference_for(&request);
                self.store_charge(&request, &outcome);
                Ok(outcome)
            }
            ScriptedCharge::AcceptThenHang(duration) => {
                let outcome = self.reference_for(&request);
                self.store_charge(&request, &outcome);
                tokio::time::sleep(duration).await;
                Ok(outcome)
            }
        }
    }

    async fn get_payment_method(
        &self,
        method_id: &str,
    ) -> Result<PaymentMethodDetails, PaymentError> {
        self.record_call("get_payment_method", vec![method_id.to_string()]);
        self.check_error("get_payment_method")?;

        self.inner
            .lock()
            .unwrap()
            .methods
            .get(method_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("Payment method"))
    }

    async fn lookup_charge(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<ChargeOutcome>, PaymentError> {
        self.record_call("lookup_charge", vec![idempotency_key.to_string()]);
        self.check_error("lookup_charge")?;

        Ok(self
            .inner
            .lock()
            .unwrap()
            .charges
            .get(idempotency_key)
            .map(|(_, outcome)| outcome.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PaymentErrorCode;

    fn request(customer: &str, key: &str) -> ChargeRequest {
        ChargeRequest {
            customer_id: customer.to_string(),
            method_id: "pm_mock_1".to_string(),
            amount_cents: 300,
            currency: "usd".to_string(),
            idempotency_key: key.to_string(),
            description: "Base subscription".to_string(),
        }
    }

    #[tokio::test]
    async fn default_charge_succeeds() {
        let mock = MockPaymentProcessor::new();
        let outcome = mock.charge(request("cus_1", "k1")).await.unwrap();
        assert!(matches!(outcome, ChargeOutcome::Succeeded { .. }));
        assert_eq!(mock.successful_charges_for("cus_1").len(), 1);
    }

    #[tokio::test]
    async fn same_key_is_not_charged_twice() {
        let mock = MockPaymentProcessor::new();
        let first = mock.charge(request("cus_1", "k1")).await.unwrap();
        let second = mock.charge(request("cus_1", "k1")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(mock.processed_charges().len(), 1);
        assert_eq!(mock.call_count("charge"), 2);
    }

    #[tokio::test]
    async fn customer_behavior_overrides_queue() {
        let mock = MockPaymentProcessor::new();
        mock.set_customer_behavior("cus_bad", ScriptedCharge::Decline("card_declined".into()));
        mock.push_charge(ScriptedCharge::Transient("reset".into()));

        let declined = mock.charge(request("cus_bad", "k1")).await.unwrap();
        assert_eq!(
            declined,
            ChargeOutcome::Declined {
                reason: "card_declined".into()
            }
        );

        let err = mock.charge(request("cus_good", "k2")).await.unwrap_err();
        assert_eq!(err.code, PaymentErrorCode::NetworkError);
        assert!(mock.lookup_charge("k2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn accepted_then_hung_charge_is_visible_to_lookup() {
        let mock = MockPaymentProcessor::new();
        mock.push_charge(ScriptedCharge::AcceptThenHang(Duration::from_secs(60)));

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            mock.charge(request("cus_1", "k1")),
        )
        .await;
        assert!(result.is_err());
        assert!(matches!(
            mock.lookup_charge("k1").await.unwrap(),
            Some(ChargeOutcome::Succeeded { .. })
        ));
    }

    #[tokio::test]
    async fn attach_and_inspect_method() {
        let mock = MockPaymentProcessor::new();
        let customer = mock.create_customer(&AccountId::new()).await.unwrap();
        let method = mock.attach_payment_method(&customer, "tok_visa").await.unwrap();

        let details = mock.get_payment_method(&method).await.unwrap();
        assert_eq!(details.brand, "visa");
        assert_eq!(details.last4, "4242");
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let mock = MockPaymentProcessor::new();
        let err = mock
            .attach_payment_method("cus_1", "tok_invalid_number")
            .await
            .unwrap_err();
        assert_eq!(err.code, PaymentErrorCode::InvalidCard);
    }

    #[tokio::test]
    async fn method_error_injection() {
        let mock = MockPaymentProcessor::new();
        mock.set_method_error("lookup_charge", PaymentError::network("down"));
        assert!(mock.lookup_charge("k1").await.is_err());
        mock.clear_errors();
        assert!(mock.lookup_charge("k1").await.is_ok());
    }
}
