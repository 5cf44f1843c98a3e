//! In-memory wiring shared by the application unit tests.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use crate::adapters::memory::{
    InMemoryAuditLog, InMemoryBillingAccountRepository, InMemoryBillingLedger,
    InMemoryMembershipStore, InMemoryReminderStore, InMemoryUsageStore, ManualClock,
    RecordingNotifier,
};
use crate::adapters::stripe::MockPaymentProcessor;
use crate::application::{BillingContext, EngineSettings};
use crate::domain::billing::BillingAccount;
use crate::domain::foundation::{AccountId, Timestamp};
use crate::ports::{BillingAccountRepository, Clock};

pub(crate) struct TestStack {
    pub accounts: InMemoryBillingAccountRepository,
    pub ledger: InMemoryBillingLedger,
    pub memberships: InMemoryMembershipStore,
    pub usage: InMemoryUsageStore,
    pub processor: MockPaymentProcessor,
    pub audit: InMemoryAuditLog,
    pub reminder_store: InMemoryReminderStore,
    pub notifier: RecordingNotifier,
    pub clock: ManualClock,
    pub settings: EngineSettings,
}

impl TestStack {
    /// Clock starts at 2026-01-01 04:00 UTC.
    pub fn new() -> Self {
        let start = Timestamp::from_datetime(Utc.with_ymd_and_hms(2026, 1, 1, 4, 0, 0).unwrap());
        Self {
            accounts: InMemoryBillingAccountRepository::new(),
            ledger: InMemoryBillingLedger::new(),
            memberships: InMemoryMembershipStore::new(),
            usage: InMemoryUsageStore::new(),
            processor: MockPaymentProcessor::new(),
            audit: InMemoryAuditLog::new(),
            reminder_store: InMemoryReminderStore::new(),
            notifier: RecordingNotifier::new(),
            clock: ManualClock::new(start),
            settings: EngineSettings::default(),
        }
    }

    pub fn context(&self) -> BillingContext {
        BillingContext {
            accounts: Arc::new(self.accounts.clone()),
            ledger: Arc::new(self.ledger.clone()),
            memberships: Arc::new(self.memberships.clone()),
            usage: Arc::new(self.usage.clone()),
            processor: Arc::new(self.processor.clone()),
            audit: Arc::new(self.audit.clone()),
            reminder_store: Arc::new(self.reminder_store.clone()),
            notifier: Arc::new(self.notifier.clone()),
            clock: Arc::new(self.clock.clone()),
            settings: Arc::new(self.settings.clone()),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub async fn insert(&self, account: BillingAccount) -> AccountId {
        let id = account.id;
        self.accounts.insert(&account).await.unwrap();
        id
    }

    pub async fn account(&self, id: &AccountId) -> BillingAccount {
        self.accounts.find_by_id(id).await.unwrap().unwrap()
    }

    /// Fresh trial account created now.
    pub async fn trial_account(&self) -> AccountId {
        self.insert(BillingAccount::new_trial(
            AccountId::new(),
            self.now(),
            &self.settings.policy,
        ))
        .await
    }

    /// Trial account with a saved card.
    pub async fn trial_account_with_card(&self) -> AccountId {
        let mut account =
            BillingAccount::new_trial(AccountId::new(), self.now(), &self.settings.policy);
        account.set_payment_method("cus_test", "pm_test", self.now());
        self.insert(account).await
    }

    /// Subscribed account past its trial, renewing in 10 days.
    pub async fn active_account(&self) -> AccountId {
        let now = self.now();
        let account = BillingAccount {
            subscribed: true,
            subscription_started_at: Some(now.minus_days(50)),
            renewal_date: Some(now.add_days(10)),
            processor_customer_id: Some("cus_active".to_string()),
            payment_method_id: Some("pm_active".to_string()),
            ..BillingAccount::new_trial(AccountId::new(), now.minus_days(60), &self.settings.policy)
        };
        self.insert(account).await
    }

    /// Subscribed account whose renewal is due now.
    pub async fn due_account(&self, customer_id: &str) -> AccountId {
        let now = self.now();
        let account = BillingAccount {
            subscribed: true,
            subscription_started_at: Some(now.minus_days(30)),
            renewal_date: Some(now),
            processor_customer_id: Some(customer_id.to_string()),
            payment_method_id: Some(format!("pm_{}", customer_id)),
            ..BillingAccount::new_trial(AccountId::new(), now.minus_days(60), &self.settings.policy)
        };
        self.insert(account).await
    }

    /// Account that reached the failure threshold.
    pub async fn terminated_account(&self) -> AccountId {
        let now = self.now();
        let account = BillingAccount {
            subscribed: false,
            subscription_started_at: Some(now.minus_days(90)),
            renewal_date: Some(now.minus_days(2)),
            failure_count: 3,
            terminated_at: Some(now),
            ..BillingAccount::new_trial(
                AccountId::new(),
                now.minus_days(120),
                &self.settings.policy,
            )
        };
        self.insert(account).await
    }
}
