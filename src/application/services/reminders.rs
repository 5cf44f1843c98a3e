//! Payment reminders ahead of the due date.
//!
//! Read-only with respect to billing state. The reminder store claim for
//! (account, UTC day) is taken before dispatch, so however often the sweep
//! runs an account hears from us at most once a day.

use crate::application::services::UsageAggregator;
use crate::application::BillingContext;
use crate::domain::billing::{due_date, BillingAccount, BillingError};
use crate::domain::foundation::{AccountId, Timestamp};
use crate::domain::reminder::{ReminderDecision, ReminderRecord};
use crate::ports::PaymentReminder;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub sent: usize,
    pub errors: Vec<(AccountId, String)>,
}

pub struct ReminderScheduler {
    ctx: BillingContext,
}

impl ReminderScheduler {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Sends today's reminders for `accounts`.
    ///
    /// A failure for one account is recorded in the report and the rest
    /// are still processed.
    pub async fn send_due_reminders(
        &self,
        accounts: &[BillingAccount],
        now: Timestamp,
    ) -> ReminderReport {
        let mut report = ReminderReport::default();
        for account in accounts {
            match self.remind(account, now).await {
                Ok(true) => report.sent += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(account_id = %account.id, error = %e, "Reminder failed");
                    report.errors.push((account.id, e.to_string()));
                }
            }
        }
        report
    }

    /// Returns `true` if a reminder was dispatched.
    pub async fn remind(
        &self,
        account: &BillingAccount,
        now: Timestamp,
    ) -> Result<bool, BillingError> {
        let policy = self.ctx.policy();
        let state = account.state(now, policy);
        let Some(due) = due_date::resolve(account, policy, now) else {
            return Ok(false);
        };

        let days_until_due = match self.ctx.settings.reminders.evaluate(state, due.days_until_due) {
            ReminderDecision::Send { days_until_due } => days_until_due,
            _ => return Ok(false),
        };

        let record = ReminderRecord::new(account.id, now);
        if !self.ctx.reminder_store.try_claim(&record).await? {
            tracing::debug!(account_id = %account.id, "Reminder already sent today");
            return Ok(false);
        }

        let reminder = match self.build(account, due.due_date, days_until_due).await {
            Ok(reminder) => reminder,
            Err(e) => {
                self.release(&record).await;
                return Err(e);
            }
        };

        if let Err(e) = self.ctx.notifier.send_reminder(&reminder).await {
            self.release(&record).await;
            return Err(e.into());
        }

        tracing::info!(
            account_id = %account.id,
            state = %state,
            days_until_due,
            amount_cents = reminder.projected_amount_cents,
            "Payment reminder sent"
        );
        Ok(true)
    }

    async fn build(
        &self,
        account: &BillingAccount,
        due_date: Timestamp,
        days_until_due: u32,
    ) -> Result<PaymentReminder, BillingError> {
        let policy = self.ctx.policy();
        let usage = UsageAggregator::new(self.ctx.memberships.clone(), self.ctx.usage.clone())
            .usage_for(&account.id)
            .await?;
        let quote = policy.pricing.quote(usage, account.pack_count);
        Ok(PaymentReminder {
            account_id: account.id,
            projected_amount_cents: quote.total_cents,
            currency: policy.currency.clone(),
            due_date,
            days_until_due,
        })
    }

    async fn release(&self, record: &ReminderRecord) {
        if let Err(e) = self
            .ctx
            .reminder_store
            .release(&record.account_id, record.day)
            .await
        {
            tracing::error!(
                account_id = %record.account_id,
                error = %e,
                "Failed to release reminder claim"
            );
        }
    }
}
