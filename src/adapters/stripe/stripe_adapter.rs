//! Stripe payment processor adapter.
//!
//! Implements the `PaymentProcessor` port against the Stripe REST API using
//! off-session PaymentIntents.
//!
//! # Idempotency
//!
//! Every charge sends the ledger attempt's key as the `Idempotency-Key`
//! header and stores it in the intent metadata, so reconciliation can find
//! the intent again through the search API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key).with_timeout(Duration::from_secs(30));
//! let adapter = StripePaymentAdapter::new(config);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::domain::foundation::AccountId;
use crate::ports::{
    ChargeOutcome, ChargeRequest, PaymentError, PaymentErrorCode, PaymentMethodDetails,
    PaymentProcessor,
};

use super::types::{
    StripeCustomer, StripeErrorEnvelope, StripePaymentIntent, StripePaymentMethod,
    StripeSearchResult,
};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Per-request timeout.
    timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: "https://api.stripe.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Stripe payment processor adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, ApiFailure> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .timeout(self.config.timeout)
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        let response = request.send().await.map_err(ApiFailure::transport)?;
        Self::parse(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiFailure> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .timeout(self.config.timeout)
            .query(query)
            .send()
            .await
            .map_err(ApiFailure::transport)?;
        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiFailure> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiFailure::Status { status, body });
        }
        response.json().await.map_err(|e| {
            ApiFailure::Payment(PaymentError::provider(format!(
                "Failed to parse Stripe response: {}",
                e
            )))
        })
    }
}

/// Failed Stripe call before it is mapped to a port result.
#[derive(Debug)]
enum ApiFailure {
    Status { status: StatusCode, body: String },
    Payment(PaymentError),
}

impl ApiFailure {
    fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiFailure::Payment(PaymentError::timeout(err.to_string()))
        } else {
            ApiFailure::Payment(PaymentError::network(err.to_string()))
        }
    }

    fn into_payment_error(self) -> PaymentError {
        match self {
            ApiFailure::Payment(err) => err,
            ApiFailure::Status { status, body } => classify_error(status, &body),
        }
    }
}

/// Maps a non-2xx Stripe response to a `PaymentError`.
fn classify_error(status: StatusCode, body: &str) -> PaymentError {
    let api_error = serde_json::from_str::<StripeErrorEnvelope>(body)
        .map(|e| e.error)
        .unwrap_or_default();
    let message = api_error
        .message
        .clone()
        .unwrap_or_else(|| format!("Stripe API error ({})", status));

    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PaymentErrorCode::AuthenticationError,
        StatusCode::NOT_FOUND => PaymentErrorCode::NotFound,
        StatusCode::TOO_MANY_REQUESTS => PaymentErrorCode::RateLimitExceeded,
        _ if api_error.is_card_error() => PaymentErrorCode::InvalidCard,
        s if s.is_server_error() => PaymentErrorCode::ProviderError,
        _ => PaymentErrorCode::Unknown,
    };

    let err = PaymentError::new(code, message);
    match api_error.code {
        Some(provider_code) => err.with_provider_code(provider_code),
        None => err,
    }
}

/// Maps a PaymentIntent to a final outcome.
///
/// Intents still in flight are an error so reconciliation retries later.
fn intent_outcome(intent: StripePaymentIntent) -> Result<ChargeOutcome, PaymentError> {
    match intent.status.as_str() {
        "succeeded" => Ok(ChargeOutcome::Succeeded { reference: intent.id }),
        "requires_payment_method" | "canceled" => Ok(ChargeOutcome::Declined {
            reason: intent
                .last_payment_error
                .map(|e| e.reason())
                .unwrap_or_else(|| intent.status.clone()),
        }),
        // 3-D Secure cannot be completed off-session.
        "requires_action" => Ok(ChargeOutcome::Declined {
            reason: "authentication_required".to_string(),
        }),
        other => Err(PaymentError::provider(format!(
            "PaymentIntent {} is still {}",
            intent.id, other
        ))),
    }
}

fn charge_params(request: &ChargeRequest) -> Vec<(&'static str, String)> {
    vec![
        ("amount", request.amount_cents.to_string()),
        ("currency", request.currency.clone()),
        ("customer", request.customer_id.clone()),
        ("payment_method", request.method_id.clone()),
        ("description", request.description.clone()),
        ("confirm", "true".to_string()),
        ("off_session", "true".to_string()),
        ("metadata[idempotency_key]", request.idempotency_key.clone()),
    ]
}

#[async_trait]
impl PaymentProcessor for StripePaymentAdapter {
    async fn create_customer(&self, account_id: &AccountId) -> Result<String, PaymentError> {
        let params = [("metadata[account_id]", account_id.to_string())];
        let customer: StripeCustomer = self
            .post_form(
                "/v1/customers",
                &params,
                Some(&format!("customer-{}", account_id)),
            )
            .await
            .map_err(|e| {
                let err = e.into_payment_error();
                tracing::error!(
                    account_id = %account_id,
                    error = %err,
                    "Stripe create_customer failed"
                );
                err
            })?;
        Ok(customer.id)
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        method_token: &str,
    ) -> Result<String, PaymentError> {
        let params = [("customer", customer_id.to_string())];
        let method: StripePaymentMethod = self
            .post_form(
                &format!("/v1/payment_methods/{}/attach", method_token),
                &params,
                None,
            )
            .await
            .map_err(ApiFailure::into_payment_error)?;

        let params = [(
            "invoice_settings[default_payment_method]",
            method.id.clone(),
        )];
        self.post_form::<StripeCustomer>(&format!("/v1/customers/{}", customer_id), &params, None)
            .await
            .map_err(ApiFailure::into_payment_error)?;

        Ok(method.id)
    }

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, PaymentError> {
        let params = charge_params(&request);
        let result = self
            .post_form::<StripePaymentIntent>(
                "/v1/payment_intents",
                &params,
                Some(&request.idempotency_key),
            )
            .await;

        match result {
            Ok(intent) => intent_outcome(intent),
            // Declines arrive as 402 card errors.
            Err(ApiFailure::Status { status, body }) if status == StatusCode::PAYMENT_REQUIRED => {
                let api_error = serde_json::from_str::<StripeErrorEnvelope>(&body)
                    .map(|e| e.error)
                    .unwrap_or_default();
                if api_error.is_card_error() {
                    tracing::info!(
                        idempotency_key = %request.idempotency_key,
                        reason = %api_error.reason(),
                        "Stripe declined charge"
                    );
                    Ok(ChargeOutcome::Declined {
                        reason: api_error.reason(),
                    })
                } else {
                    Err(classify_error(status, &body))
                }
            }
            Err(failure) => {
                let err = failure.into_payment_error();
                tracing::warn!(
                    idempotency_key = %request.idempotency_key,
                    error = %err,
                    "Stripe charge failed"
                );
                Err(err)
            }
        }
    }

    async fn get_payment_method(
        &self,
        method_id: &str,
    ) -> Result<PaymentMethodDetails, PaymentError> {
        let method: StripePaymentMethod = self
            .get_json(&format!("/v1/payment_methods/{}", method_id), &[])
            .await
            .map_err(ApiFailure::into_payment_error)?;

        let card = method
            .card
            .ok_or_else(|| PaymentError::invalid_card("Payment method is not a card"))?;
        Ok(PaymentMethodDetails {
            id: method.id,
            brand: card.brand,
            last4: card.last4,
            exp_month: card.exp_month,
            exp_year: card.exp_year,
        })
    }

    async fn lookup_charge(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<ChargeOutcome>, PaymentError> {
        let query = [(
            "query",
            format!("metadata['idempotency_key']:'{}'", idempotency_key),
        )];
        let page: StripeSearchResult<StripePaymentIntent> = self
            .get_json("/v1/payment_intents/search", &query)
            .await
            .map_err(ApiFailure::into_payment_error)?;

        match page.data.into_iter().next() {
            Some(intent) => intent_outcome(intent).map(Some),
            None => Ok(None),
        }
    }
}
