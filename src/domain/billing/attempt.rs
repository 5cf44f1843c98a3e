//! Charge attempts recorded in the billing ledger.

use serde::{Deserialize, Serialize};

use super::{ChargeQuote, LineItem};
use crate::domain::foundation::{
    AccountId, AttemptId, DomainError, ErrorCode, StateMachine, Timestamp,
};

/// Half-open billing period `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl BillingPeriod {
    /// Period of `cycle_days` starting at `start`.
    pub fn starting_at(start: Timestamp, cycle_days: i64) -> Self {
        Self {
            start,
            end: start.add_days(cycle_days),
        }
    }

    pub fn contains(&self, instant: &Timestamp) -> bool {
        !instant.is_before(&self.start) && instant.is_before(&self.end)
    }
}

/// What a charge attempt pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeKind {
    /// First charge of a new subscription.
    Subscription,
    /// Recurring charge for the next period.
    Renewal,
    /// Next period paid ahead of the due date at the account's request.
    EarlyPayment,
}

impl ChargeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeKind::Subscription => "subscription",
            ChargeKind::Renewal => "renewal",
            ChargeKind::EarlyPayment => "early_payment",
        }
    }

    /// Only sweep-initiated renewals move the failure counter. A failed
    /// user-initiated charge is reported to the caller instead.
    pub fn counts_failures(&self) -> bool {
        matches!(self, ChargeKind::Renewal)
    }
}

/// Ledger status of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Succeeded,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Succeeded => "succeeded",
            AttemptStatus::Failed => "failed",
        }
    }

    /// Statuses that block a new attempt for the same period.
    pub fn blocks_new_attempt(&self) -> bool {
        matches!(self, AttemptStatus::Pending | AttemptStatus::Succeeded)
    }
}

impl StateMachine for AttemptStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use AttemptStatus::*;
        matches!((self, target), (Pending, Succeeded) | (Pending, Failed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use AttemptStatus::*;
        match self {
            Pending => vec![Succeeded, Failed],
            Succeeded | Failed => vec![],
        }
    }
}

/// One row of the billing ledger.
///
/// # Invariants
///
/// - Created `Pending` before the processor is contacted
/// - Leaves `Pending` at most once; immutable afterwards
/// - `id` doubles as the processor idempotency key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeAttempt {
    pub id: AttemptId,
    pub account_id: AccountId,
    pub kind: ChargeKind,
    pub period: BillingPeriod,
    pub amount_cents: i64,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub description: String,

    /// Packs the account had reserved when the attempt was priced. Billed
    /// packs may be higher when usage exceeded the reservation.
    pub reserved_packs: u32,

    pub status: AttemptStatus,
    pub processor_reference: Option<String>,
    pub failure_reason: Option<String>,

    /// Set once the failure counter has been settled for this attempt, so
    /// reconciliation must not count it again.
    pub failure_counted: bool,

    pub created_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}

impl ChargeAttempt {
    /// Builds a pending attempt from a quote.
    pub fn pending(
        account_id: AccountId,
        kind: ChargeKind,
        period: BillingPeriod,
        quote: &ChargeQuote,
        currency: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: AttemptId::new(),
            account_id,
            kind,
            period,
            amount_cents: quote.total_cents,
            currency: currency.into(),
            line_items: quote.line_items.clone(),
            description: quote.description.clone(),
            reserved_packs: quote.reserved_packs,
            status: AttemptStatus::Pending,
            processor_reference: None,
            failure_reason: None,
            failure_counted: false,
            created_at: now,
            settled_at: None,
        }
    }

    pub fn idempotency_key(&self) -> String {
        self.id.idempotency_key()
    }

    pub fn is_pending(&self) -> bool {
        self.status == AttemptStatus::Pending
    }

    /// Marks the attempt succeeded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if the attempt already settled.
    pub fn succeed(
        &mut self,
        reference: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        self.settle(AttemptStatus::Succeeded, now)?;
        self.processor_reference = Some(reference.into());
        Ok(())
    }

    /// Marks the attempt failed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if the attempt already settled.
    pub fn fail(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), DomainError> {
        self.settle(AttemptStatus::Failed, now)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    fn settle(&mut self, target: AttemptStatus, now: Timestamp) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Attempt {} is already {}",
                    self.id,
                    self.status.as_str()
                ),
            )
            .with_detail("current", self.status.as_str())
        })?;
        self.settled_at = Some(now);
        Ok(())
    }
}
