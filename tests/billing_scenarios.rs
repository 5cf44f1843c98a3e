//! End-to-end billing scenarios driven through the public handlers and the
//! nightly sweep, against in-memory adapters and a settable clock.

mod common;

use std::time::Duration;

use common::Engine;

use hearth_billing::adapters::stripe::ScriptedCharge;
use hearth_billing::application::handlers::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, ComputeInvoiceHandler,
    ComputeInvoiceQuery, GetBillingHistoryHandler, GetBillingHistoryQuery,
    GetPaymentMethodHandler, GetPaymentMethodQuery, PayNowCommand, PayNowHandler,
    ReactivateSubscriptionCommand, ReactivateSubscriptionHandler, SavePaymentMethodCommand,
    SavePaymentMethodHandler, StartSubscriptionCommand, StartSubscriptionHandler,
};
use hearth_billing::domain::billing::{AttemptStatus, BillingError, BillingState, ChargeKind};
use hearth_billing::domain::foundation::AccountId;

// =============================================================================
// Helpers
// =============================================================================

async fn save_card(engine: &Engine, account_id: AccountId) {
    SavePaymentMethodHandler::new(engine.context())
        .handle(SavePaymentMethodCommand {
            account_id,
            method_token: "tok_visa".to_string(),
        })
        .await
        .unwrap();
}

async fn start(engine: &Engine, account_id: AccountId, pack_count: u32) {
    StartSubscriptionHandler::new(engine.context())
        .handle(StartSubscriptionCommand {
            account_id,
            pack_count,
        })
        .await
        .unwrap();
}

// =============================================================================
// Trial reminders
// =============================================================================

#[tokio::test]
async fn trial_reminders_fire_on_day_15_and_19_only() {
    let engine = Engine::new();
    let day0 = engine.now();
    let account_id = engine.trial_account().await;

    let mut reminder_days = Vec::new();
    for day in 0..=25 {
        engine.clock.set(day0.add_days(day));
        let before = engine.notifier.sent_to(&account_id).await.len();

        // Several runs on the same day must not repeat a reminder.
        engine.sweep().await;
        engine.sweep().await;
        engine.sweep().await;

        let after = engine.notifier.sent_to(&account_id).await.len();
        assert!(after - before <= 1, "day {} sent {} reminders", day, after - before);
        if after > before {
            reminder_days.push(day);
        }
    }

    assert_eq!(reminder_days, vec![15, 19]);
    let sent = engine.notifier.sent_to(&account_id).await;
    assert_eq!(sent[0].days_until_due, 5);
    assert_eq!(sent[1].days_until_due, 1);
    assert_eq!(sent[0].projected_amount_cents, 300);
    assert_eq!(engine.processor.call_count("charge"), 0);
}

// =============================================================================
// First subscription during the trial
// =============================================================================

#[tokio::test]
async fn early_subscription_keeps_the_full_trial() {
    let engine = Engine::new();
    let day0 = engine.now();
    let account_id = engine.trial_account().await;

    engine.clock.set(day0.add_days(3));
    save_card(&engine, account_id).await;
    let result = StartSubscriptionHandler::new(engine.context())
        .handle(StartSubscriptionCommand {
            account_id,
            pack_count: 0,
        })
        .await
        .unwrap();

    assert_eq!(result.amount_cents, 300);
    assert_eq!(result.renewal_date, day0.add_days(33));

    let invoice = ComputeInvoiceHandler::new(engine.context())
        .handle(ComputeInvoiceQuery { account_id })
        .await
        .unwrap();
    let due = invoice.due_date.unwrap();
    let trial_end = day0.add_days(20);
    assert!(!due.is_before(&trial_end));
    assert!(!due.is_before(&engine.now()));
    assert_eq!(due, result.renewal_date);
    assert_eq!(invoice.state, BillingState::Active);
}

#[tokio::test]
async fn invoice_is_stable_for_unchanged_inputs() {
    let engine = Engine::new();
    let account_id = engine.trial_account().await;
    engine.clock.advance_days(4);

    let handler = ComputeInvoiceHandler::new(engine.context());
    let first = handler
        .handle(ComputeInvoiceQuery { account_id })
        .await
        .unwrap();
    let second = handler
        .handle(ComputeInvoiceQuery { account_id })
        .await
        .unwrap();

    assert_eq!(first.due_date, second.due_date);
    assert_eq!(first.total_cents, second.total_cents);
    assert_eq!(first.days_until_due, Some(16));
    assert!(first.can_pay_now);
}

#[tokio::test]
async fn start_without_payment_method_writes_nothing() {
    let engine = Engine::new();
    let account_id = engine.trial_account().await;

    let err = StartSubscriptionHandler::new(engine.context())
        .handle(StartSubscriptionCommand {
            account_id,
            pack_count: 2,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::NoPaymentMethod(_)));
    assert!(engine.ledger.all().await.is_empty());
    assert!(!engine.account(&account_id).await.subscribed);
}

#[tokio::test]
async fn unconfirmed_first_charge_is_settled_once_by_the_sweep() {
    let mut engine = Engine::new();
    engine.settings.processor_timeout = Duration::from_millis(20);
    engine.settings.pending_grace = Duration::from_secs(60);
    let day0 = engine.now();
    let account_id = engine.trial_account().await;
    save_card(&engine, account_id).await;
    engine
        .processor
        .push_charge(ScriptedCharge::AcceptThenHang(Duration::from_millis(200)));

    let handler = StartSubscriptionHandler::new(engine.context());
    let first = handler
        .handle(StartSubscriptionCommand {
            account_id,
            pack_count: 1,
        })
        .await
        .unwrap_err();
    assert!(matches!(first, BillingError::ProcessorTransient { .. }));

    // The user retries the next day, before any sweep has run.
    engine.clock.set(day0.add_days(1));
    let retry = handler
        .handle(StartSubscriptionCommand {
            account_id,
            pack_count: 1,
        })
        .await
        .unwrap_err();
    assert!(matches!(retry, BillingError::ProcessorTransient { .. }));

    let summary = engine.sweep().await;
    assert_eq!(summary.reconciled, 1);

    let customer_id = engine
        .account(&account_id)
        .await
        .processor_customer_id
        .unwrap();
    assert_eq!(engine.processor.successful_charges_for(&customer_id).len(), 1);
    let account = engine.account(&account_id).await;
    assert!(account.subscribed);
    assert_eq!(account.pack_count, 1);
    assert_eq!(account.failure_count, 0);
    assert_eq!(account.renewal_date, Some(day0.add_days(30)));
}

// =============================================================================
// Pay now
// =============================================================================

#[tokio::test]
async fn pay_now_opens_inside_the_early_window() {
    let engine = Engine::new();
    let day0 = engine.now();
    let account_id = engine.trial_account().await;
    engine.clock.set(day0.add_days(3));
    save_card(&engine, account_id).await;
    start(&engine, account_id, 0).await;

    let handler = PayNowHandler::new(engine.context());
    let err = handler.handle(PayNowCommand { account_id }).await.unwrap_err();
    assert_eq!(err, BillingError::PayNowNotPermitted { days_until_due: 30 });

    engine.clock.set(day0.add_days(27));
    let paid = handler.handle(PayNowCommand { account_id }).await.unwrap();

    assert!(!paid.started_subscription);
    assert_eq!(paid.renewal_date, day0.add_days(63));
    let account = engine.account(&account_id).await;
    assert_eq!(account.renewal_date, Some(day0.add_days(63)));

    // The sweep on the old due date finds nothing left to collect.
    engine.clock.set(day0.add_days(33));
    let summary = engine.sweep().await;
    assert_eq!(summary.charged, 0);
    assert_eq!(engine.processor.call_count("charge"), 2);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn scheduled_cancellation_lapses_at_period_end() {
    let engine = Engine::new();
    let day0 = engine.now();
    let account_id = engine.paying_account("cus_leaving").await;

    let cancel = CancelSubscriptionHandler::new(engine.context());
    let reactivate = ReactivateSubscriptionHandler::new(engine.context());

    let scheduled = cancel
        .handle(CancelSubscriptionCommand { account_id })
        .await
        .unwrap();
    assert_eq!(scheduled.effective_at, day0.add_days(20));

    engine.clock.set(day0.add_days(10));
    reactivate
        .handle(ReactivateSubscriptionCommand { account_id })
        .await
        .unwrap();
    cancel
        .handle(CancelSubscriptionCommand { account_id })
        .await
        .unwrap();

    engine.clock.set(day0.add_days(20));
    let summary = engine.sweep().await;
    assert_eq!(summary.lapsed, 1);
    assert_eq!(summary.charged, 0);

    let account = engine.account(&account_id).await;
    assert_eq!(account.state(engine.now(), &engine.settings.policy), BillingState::Cancelled);
    assert!(engine.processor.successful_charges_for("cus_leaving").is_empty());

    let err = reactivate
        .handle(ReactivateSubscriptionCommand { account_id })
        .await
        .unwrap_err();
    assert_eq!(err, BillingError::NotEligibleToReactivate);
}

#[tokio::test]
async fn lapsed_account_resubscribes_with_a_fresh_first_charge() {
    let engine = Engine::new();
    let day0 = engine.now();
    let account_id = engine.trial_account().await;
    save_card(&engine, account_id).await;
    start(&engine, account_id, 0).await;

    CancelSubscriptionHandler::new(engine.context())
        .handle(CancelSubscriptionCommand { account_id })
        .await
        .unwrap();

    // The first charge funded days 0..30; the cancellation ends there.
    engine.clock.set(day0.add_days(30));
    assert_eq!(engine.sweep().await.lapsed, 1);

    engine.clock.set(day0.add_days(35));
    start(&engine, account_id, 1).await;

    let history = GetBillingHistoryHandler::new(engine.context())
        .handle(GetBillingHistoryQuery { account_id })
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .all(|a| a.kind == ChargeKind::Subscription && a.status == AttemptStatus::Succeeded));
    assert_eq!(history[0].amount_cents, 400);
}

// =============================================================================
// Payment methods
// =============================================================================

#[tokio::test]
async fn saved_card_is_readable_and_reused() {
    let engine = Engine::new();
    let account_id = engine.trial_account().await;
    save_card(&engine, account_id).await;

    let method = GetPaymentMethodHandler::new(engine.context())
        .handle(GetPaymentMethodQuery { account_id })
        .await
        .unwrap();
    assert_eq!(method.brand, "visa");
    assert_eq!(method.last4, "4242");

    SavePaymentMethodHandler::new(engine.context())
        .handle(SavePaymentMethodCommand {
            account_id,
            method_token: "tok_mastercard".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(engine.processor.call_count("create_customer"), 1);
    let method = GetPaymentMethodHandler::new(engine.context())
        .handle(GetPaymentMethodQuery { account_id })
        .await
        .unwrap();
    assert_eq!(method.last4, "4444");
}
