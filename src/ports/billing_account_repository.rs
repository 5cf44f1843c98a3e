//! Billing account repository port.
//!
//! # Example
//!
//! ```ignore
//! let mut account = repo
//!     .find_by_id(&account_id)
//!     .await?
//!     .ok_or(BillingError::AccountNotFound(account_id))?;
//! account.schedule_cancellation(&policy, clock.now())?;
//! repo.update(&account).await?;
//! ```

use crate::domain::billing::BillingAccount;
use crate::domain::foundation::{AccountId, DomainError};
use async_trait::async_trait;

/// Persistence for `BillingAccount` aggregates.
///
/// Accounts are never deleted.
#[async_trait]
pub trait BillingAccountRepository: Send + Sync {
    /// Save a new account.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the account already exists
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, account: &BillingAccount) -> Result<(), DomainError>;

    /// Update an existing account.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if the account doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, account: &BillingAccount) -> Result<(), DomainError>;

    /// Find an account by ID.
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<BillingAccount>, DomainError>;

    /// Accounts the nightly sweep looks at: not permanent, and either
    /// subscribed or never subscribed. Ordered by ID.
    async fn list_sweep_candidates(&self) -> Result<Vec<BillingAccount>, DomainError>;
}
