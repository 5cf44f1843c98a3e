//! Audit events.
//!
//! Every state-changing billing operation produces one of these. Events are
//! named in past tense and carry a human-readable explanation for support
//! staff reading the audit trail.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AccountId, AttemptId, MembershipId, Timestamp, WorkspaceId};

/// Something that happened to a billing account or workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    PaymentMethodSaved {
        account_id: AccountId,
        brand: String,
        last4: String,
        occurred_at: Timestamp,
    },

    SubscriptionStarted {
        account_id: AccountId,
        attempt_id: AttemptId,
        pack_count: u32,
        amount_cents: i64,
        renewal_date: Timestamp,
        occurred_at: Timestamp,
    },

    PacksUpdated {
        account_id: AccountId,
        old_pack_count: u32,
        new_pack_count: u32,
        storage_allowance_bytes: u64,
        occurred_at: Timestamp,
    },

    CancellationScheduled {
        account_id: AccountId,
        end_date: Timestamp,
        occurred_at: Timestamp,
    },

    Reactivated {
        account_id: AccountId,
        occurred_at: Timestamp,
    },

    /// Scheduled cancellation took effect.
    SubscriptionLapsed {
        account_id: AccountId,
        occurred_at: Timestamp,
    },

    ChargeSucceeded {
        account_id: AccountId,
        attempt_id: AttemptId,
        amount_cents: i64,
        processor_reference: String,
        occurred_at: Timestamp,
    },

    ChargeFailed {
        account_id: AccountId,
        attempt_id: AttemptId,
        amount_cents: i64,
        reason: String,
        failure_count: u32,
        occurred_at: Timestamp,
    },

    AccountTerminated {
        account_id: AccountId,
        failure_count: u32,
        occurred_at: Timestamp,
    },

    WorkspaceRestricted {
        account_id: AccountId,
        workspace_id: WorkspaceId,
        restricted_until: Timestamp,
        occurred_at: Timestamp,
    },

    RoleDemoted {
        account_id: AccountId,
        workspace_id: WorkspaceId,
        membership_id: MembershipId,
        remaining_payers: usize,
        occurred_at: Timestamp,
    },
}

impl AuditEvent {
    pub fn account_id(&self) -> AccountId {
        match self {
            AuditEvent::PaymentMethodSaved { account_id, .. }
            | AuditEvent::SubscriptionStarted { account_id, .. }
            | AuditEvent::PacksUpdated { account_id, .. }
            | AuditEvent::CancellationScheduled { account_id, .. }
            | AuditEvent::Reactivated { account_id, .. }
            | AuditEvent::SubscriptionLapsed { account_id, .. }
            | AuditEvent::ChargeSucceeded { account_id, .. }
            | AuditEvent::ChargeFailed { account_id, .. }
            | AuditEvent::AccountTerminated { account_id, .. }
            | AuditEvent::WorkspaceRestricted { account_id, .. }
            | AuditEvent::RoleDemoted { account_id, .. } => *account_id,
        }
    }

    pub fn occurred_at(&self) -> Timestamp {
        match self {
            AuditEvent::PaymentMethodSaved { occurred_at, .. }
            | AuditEvent::SubscriptionStarted { occurred_at, .. }
            | AuditEvent::PacksUpdated { occurred_at, .. }
            | AuditEvent::CancellationScheduled { occurred_at, .. }
            | AuditEvent::Reactivated { occurred_at, .. }
            | AuditEvent::SubscriptionLapsed { occurred_at, .. }
            | AuditEvent::ChargeSucceeded { occurred_at, .. }
            | AuditEvent::ChargeFailed { occurred_at, .. }
            | AuditEvent::AccountTerminated { occurred_at, .. }
            | AuditEvent::WorkspaceRestricted { occurred_at, .. }
            | AuditEvent::RoleDemoted { occurred_at, .. } => *occurred_at,
        }
    }

    /// Workspace the event concerns, for cascade events.
    pub fn workspace_id(&self) -> Option<WorkspaceId> {
        match self {
            AuditEvent::WorkspaceRestricted { workspace_id, .. }
            | AuditEvent::RoleDemoted { workspace_id, .. } => Some(*workspace_id),
            _ => None,
        }
    }

    /// Stable event name for storage and filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::PaymentMethodSaved { .. } => "billing.payment_method_saved",
            AuditEvent::SubscriptionStarted { .. } => "billing.subscription_started",
            AuditEvent::PacksUpdated { .. } => "billing.packs_updated",
            AuditEvent::CancellationScheduled { .. } => "billing.cancellation_scheduled",
            AuditEvent::Reactivated { .. } => "billing.reactivated",
            AuditEvent::SubscriptionLapsed { .. } => "billing.subscription_lapsed",
            AuditEvent::ChargeSucceeded { .. } => "billing.charge_succeeded",
            AuditEvent::ChargeFailed { .. } => "billing.charge_failed",
            AuditEvent::AccountTerminated { .. } => "billing.account_terminated",
            AuditEvent::WorkspaceRestricted { .. } => "workspace.restricted",
            AuditEvent::RoleDemoted { .. } => "workspace.role_demoted",
        }
    }

    /// Human-readable explanation.
    pub fn explanation(&self) -> String {
        match self {
            AuditEvent::PaymentMethodSaved { brand, last4, .. } => {
                format!("Saved {} card ending in {}", brand, last4)
            }
            AuditEvent::SubscriptionStarted {
                pack_count,
                amount_cents,
                renewal_date,
                ..
            } => format!(
                "Subscription started with {} extra pack(s); charged {} cents, renews {}",
                pack_count,
                amount_cents,
                renewal_date.date()
            ),
            AuditEvent::PacksUpdated {
                old_pack_count,
                new_pack_count,
                ..
            } => format!(
                "Storage packs changed from {} to {}",
                old_pack_count, new_pack_count
            ),
            AuditEvent::CancellationScheduled { end_date, .. } => {
                format!("Cancellation scheduled; access continues until {}", end_date.date())
            }
            AuditEvent::Reactivated { .. } => {
                "Scheduled cancellation withdrawn; subscription continues".to_string()
            }
            AuditEvent::SubscriptionLapsed { .. } => {
                "Scheduled cancellation took effect; subscription ended".to_string()
            }
            AuditEvent::ChargeSucceeded { amount_cents, .. } => {
                format!("Charged {} cents", amount_cents)
            }
            AuditEvent::ChargeFailed {
                amount_cents,
                reason,
                failure_count,
                ..
            } => format!(
                "Charge of {} cents failed ({}); consecutive failures: {}",
                amount_cents, reason, failure_count
            ),
            AuditEvent::AccountTerminated { failure_count, .. } => format!(
                "Billing terminated after {} consecutive failed charges",
                failure_count
            ),
            AuditEvent::WorkspaceRestricted {
                restricted_until, ..
            } => format!(
                "Workspace restricted until {}: its only paying admin's billing was terminated, \
                 so changes are blocked while content stays readable",
                restricted_until.date()
            ),
            AuditEvent::RoleDemoted {
                remaining_payers, ..
            } => format!(
                "Role demoted to member after billing termination; {} other paying admin(s) \
                 keep the workspace fully writable",
                remaining_payers
            ),
        }
    }
}
