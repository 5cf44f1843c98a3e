//! Shared wiring for billing handlers and services.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::billing::{AuditEvent, BillingAccount, BillingError, BillingPolicy};
use crate::domain::foundation::AccountId;
use crate::domain::reminder::ReminderPolicy;
use crate::ports::{
    AuditLog, BillingAccountRepository, BillingLedger, Clock, MembershipStore, PaymentError,
    PaymentProcessor, ReminderNotifier, ReminderStore, UsageStore,
};

/// Tunables that are not part of the pricing policy.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub policy: BillingPolicy,
    pub reminders: ReminderPolicy,

    /// Bound on every processor call.
    pub processor_timeout: Duration,

    /// Age after which a pending attempt is reconciled.
    pub pending_grace: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            policy: BillingPolicy::default(),
            reminders: ReminderPolicy::default(),
            processor_timeout: Duration::from_secs(30),
            pending_grace: Duration::from_secs(900),
        }
    }
}

/// Ports and settings the billing engine runs against.
///
/// Cheap to clone; every field is reference counted.
#[derive(Clone)]
pub struct BillingContext {
    pub accounts: Arc<dyn BillingAccountRepository>,
    pub ledger: Arc<dyn BillingLedger>,
    pub memberships: Arc<dyn MembershipStore>,
    pub usage: Arc<dyn UsageStore>,
    pub processor: Arc<dyn PaymentProcessor>,
    pub audit: Arc<dyn AuditLog>,
    pub reminder_store: Arc<dyn ReminderStore>,
    pub notifier: Arc<dyn ReminderNotifier>,
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<EngineSettings>,
}

impl BillingContext {
    pub fn policy(&self) -> &BillingPolicy {
        &self.settings.policy
    }

    pub(crate) async fn load_account(
        &self,
        account_id: &AccountId,
    ) -> Result<BillingAccount, BillingError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or(BillingError::AccountNotFound(*account_id))
    }

    /// Rejects a user-initiated charge while an earlier attempt for the
    /// account is unsettled. Reconciliation resolves the earlier attempt.
    pub(crate) async fn ensure_no_charge_in_flight(
        &self,
        account_id: &AccountId,
    ) -> Result<(), BillingError> {
        match self.ledger.pending_for_account(account_id).await? {
            None => Ok(()),
            Some(attempt) => {
                tracing::info!(
                    account_id = %account_id,
                    attempt_id = %attempt.id,
                    "Earlier charge still awaiting settlement"
                );
                Err(BillingError::transient(format!(
                    "charge {} is still awaiting confirmation from the processor",
                    attempt.id
                )))
            }
        }
    }

    /// Records an audit event.
    ///
    /// Runs after the state change is persisted, so a failing audit sink is
    /// logged instead of failing the operation.
    pub(crate) async fn record_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(&event).await {
            tracing::error!(
                account_id = %event.account_id(),
                event_type = event.event_type(),
                error = %e,
                "Failed to record audit event"
            );
        }
    }

    /// Runs a processor call under `processor_timeout`.
    pub(crate) async fn call_processor<T, F>(&self, call: F) -> Result<T, PaymentError>
    where
        F: Future<Output = Result<T, PaymentError>>,
    {
        let timeout = self.settings.processor_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PaymentError::timeout(format!(
                "no response within {} ms",
                timeout.as_millis()
            ))),
        }
    }
}
