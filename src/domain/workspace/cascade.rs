//! Cascade decision for one workspace.
//!
//! Given the elevated holders read inside the workspace's transaction, decide
//! whether the failing account is demoted or the workspace is restricted.
//! A workspace never silently loses its paying coverage.

use serde::{Deserialize, Serialize};

use super::WorkspaceMembership;
use crate::domain::billing::BillingState;
use crate::domain::foundation::{AccountId, MembershipId, Timestamp};

/// Outcome of the cascade for one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CascadeDecision {
    /// No other paying holder: block writes until `until`.
    Restrict { until: Timestamp },

    /// Other paying holders remain: demote only the failing membership.
    Demote {
        membership_id: MembershipId,
        remaining_payers: usize,
    },

    /// The failing account no longer holds elevated privilege here.
    NotElevated,

    /// Already restricted at least until the requested date.
    AlreadyRestricted { until: Timestamp },
}

/// An elevated holder with the billing state of its account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderCoverage {
    pub membership: WorkspaceMembership,
    pub state: BillingState,
}

/// Decides the cascade action for `failing_account` in one workspace.
pub fn decide(
    failing_account: AccountId,
    holders: &[HolderCoverage],
    current_restriction: Option<Timestamp>,
    now: Timestamp,
    restricted_mode_days: i64,
) -> CascadeDecision {
    let failing = holders
        .iter()
        .find(|h| h.membership.account_id == failing_account && h.membership.is_elevated());
    let Some(failing) = failing else {
        return CascadeDecision::NotElevated;
    };

    let remaining_payers = holders
        .iter()
        .filter(|h| h.membership.account_id != failing_account)
        .filter(|h| h.membership.is_elevated() && h.state.covers_workspace())
        .count();

    if remaining_payers > 0 {
        return CascadeDecision::Demote {
            membership_id: failing.membership.id,
            remaining_payers,
        };
    }

    let until = now.add_days(restricted_mode_days);
    match current_restriction {
        Some(existing) if !existing.is_before(&until) => {
            CascadeDecision::AlreadyRestricted { until: existing }
        }
        _ => CascadeDecision::Restrict { until },
    }
}
