//! In-memory engine shared by the scenario tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use hearth_billing::adapters::memory::{
    InMemoryAuditLog, InMemoryBillingAccountRepository, InMemoryBillingLedger,
    InMemoryMembershipStore, InMemoryReminderStore, InMemoryUsageStore, ManualClock,
    RecordingNotifier,
};
use hearth_billing::adapters::stripe::MockPaymentProcessor;
use hearth_billing::application::{BillingContext, EngineSettings, NightlySweep, SweepSummary};
use hearth_billing::domain::billing::BillingAccount;
use hearth_billing::domain::foundation::{AccountId, Timestamp};
use hearth_billing::ports::{BillingAccountRepository, Clock};

pub struct Engine {
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

impl Engine {
    /// Day 0 is 2026-03-02 04:00 UTC.
    pub fn new() -> Self {
        let start = Timestamp::from_datetime(Utc.with_ymd_and_hms(2026, 3, 2, 4, 0, 0).unwrap());
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

    pub async fn sweep(&self) -> SweepSummary {
        NightlySweep::new(self.context()).run().await.unwrap()
    }

    pub async fn account(&self, id: &AccountId) -> BillingAccount {
        self.accounts.find_by_id(id).await.unwrap().unwrap()
    }

    /// Trial account created at the current clock time.
    pub async fn trial_account(&self) -> AccountId {
        let account =
            BillingAccount::new_trial(AccountId::new(), self.now(), &self.settings.policy);
        let id = account.id;
        self.accounts.insert(&account).await.unwrap();
        id
    }

    /// Subscribed account with a card, renewal due now.
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
        let id = account.id;
        self.accounts.insert(&account).await.unwrap();
        id
    }

    /// Subscribed account in good standing, renewing in 20 days.
    pub async fn paying_account(&self, customer_id: &str) -> AccountId {
        let now = self.now();
        let account = BillingAccount {
            subscribed: true,
            subscription_started_at: Some(now.minus_days(40)),
            renewal_date: Some(now.add_days(20)),
            processor_customer_id: Some(customer_id.to_string()),
            payment_method_id: Some(format!("pm_{}", customer_id)),
            ..BillingAccount::new_trial(AccountId::new(), now.minus_days(60), &self.settings.policy)
        };
        let id = account.id;
        self.accounts.insert(&account).await.unwrap();
        id
    }
}
