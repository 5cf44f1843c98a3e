//! Nightly sweep re-runs, concurrent runs, failure escalation and
//! reconciliation of attempts that never resolved.

mod common;

use std::time::Duration;

use common::Engine;

use hearth_billing::adapters::stripe::ScriptedCharge;
use hearth_billing::application::NightlySweep;
use hearth_billing::domain::billing::{AttemptStatus, BillingState};
use hearth_billing::ports::MembershipStore;

#[tokio::test]
async fn concurrent_sweeps_settle_each_period_once() {
    let engine = Engine::new();
    let mut due = Vec::new();
    for n in 0..5 {
        due.push(engine.due_account(&format!("cus_due_{}", n)).await);
    }

    let first = NightlySweep::new(engine.context());
    let second = NightlySweep::new(engine.context());
    let (a, b) = tokio::join!(first.run(), second.run());
    let (a, b) = (a.unwrap(), b.unwrap());

    // The losing run sees the other's row and backs off without calling out.
    assert!(a.errors.is_empty() && b.errors.is_empty());
    assert!(a.charged + b.charged >= 1);
    assert_eq!(engine.processor.call_count("charge"), 5);
    for (n, account_id) in due.iter().enumerate() {
        assert_eq!(
            engine
                .ledger
                .count_with_status(account_id, AttemptStatus::Succeeded)
                .await,
            1
        );
        assert_eq!(
            engine
                .processor
                .successful_charges_for(&format!("cus_due_{}", n))
                .len(),
            1
        );
        let account = engine.account(account_id).await;
        assert_eq!(account.renewal_date, Some(engine.now().add_days(30)));
    }
}

#[tokio::test]
async fn rerun_on_the_same_day_is_a_no_op() {
    let engine = Engine::new();
    let paid = engine.due_account("cus_ok").await;
    let declined = engine.due_account("cus_declined").await;
    engine
        .processor
        .set_customer_behavior("cus_declined", ScriptedCharge::Decline("card_declined".into()));

    let first = engine.sweep().await;
    assert_eq!(first.charged, 1);
    assert_eq!(first.failed, 1);

    let second = engine.sweep().await;
    assert_eq!(second.charged, 0);
    assert_eq!(second.failed, 0);
    assert_eq!(engine.processor.call_count("charge"), 2);
    assert_eq!(engine.account(&declined).await.failure_count, 1);
    assert_eq!(engine.account(&paid).await.failure_count, 0);
}

#[tokio::test]
async fn three_failed_sweeps_terminate_and_cascade_once() {
    let engine = Engine::new();
    let account_id = engine.due_account("cus_broke").await;
    let (workspace_id, _) = engine.memberships.seed_workspace(&[account_id]).await;
    engine
        .processor
        .set_customer_behavior("cus_broke", ScriptedCharge::Decline("insufficient_funds".into()));

    let mut failure_counts = Vec::new();
    for _ in 0..3 {
        engine.sweep().await;
        engine.sweep().await;
        failure_counts.push(engine.account(&account_id).await.failure_count);
        engine.clock.advance_days(1);
    }
    // Further nights leave a terminated account alone.
    engine.sweep().await;
    engine.clock.advance_days(1);
    engine.sweep().await;

    assert_eq!(failure_counts, vec![1, 2, 3]);
    assert_eq!(
        engine
            .ledger
            .count_with_status(&account_id, AttemptStatus::Failed)
            .await,
        3
    );
    let account = engine.account(&account_id).await;
    assert_eq!(
        account.state(engine.now(), &engine.settings.policy),
        BillingState::Terminated
    );
    assert!(!account.subscribed);
    assert_eq!(engine.audit.count("billing.account_terminated").await, 1);
    assert_eq!(engine.audit.count("workspace.restricted").await, 1);

    let workspace = engine
        .memberships
        .find_workspace(&workspace_id)
        .await
        .unwrap()
        .unwrap();
    assert!(workspace.is_restricted(engine.now()));
}

#[tokio::test]
async fn success_resets_the_failure_counter() {
    let engine = Engine::new();
    let account_id = engine.due_account("cus_flaky").await;
    engine.processor.push_charge(ScriptedCharge::Decline("card_declined".into()));
    engine.processor.push_charge(ScriptedCharge::Decline("card_declined".into()));

    engine.sweep().await;
    engine.clock.advance_days(1);
    engine.sweep().await;
    assert_eq!(engine.account(&account_id).await.failure_count, 2);

    engine.clock.advance_days(1);
    let summary = engine.sweep().await;
    assert_eq!(summary.charged, 1);

    let account = engine.account(&account_id).await;
    assert_eq!(account.failure_count, 0);
    assert_eq!(
        account.state(engine.now(), &engine.settings.policy),
        BillingState::Active
    );
}

#[tokio::test]
async fn timed_out_charge_is_reconciled_before_retry() {
    let mut engine = Engine::new();
    engine.settings.processor_timeout = Duration::from_millis(20);
    engine.settings.pending_grace = Duration::from_secs(60);
    let account_id = engine.due_account("cus_slow").await;
    engine
        .processor
        .push_charge(ScriptedCharge::AcceptThenHang(Duration::from_millis(200)));

    // The processor took the money but the response never arrived.
    let first = engine.sweep().await;
    assert_eq!(first.failed, 1);
    assert_eq!(engine.account(&account_id).await.failure_count, 1);
    assert_eq!(
        engine
            .ledger
            .count_with_status(&account_id, AttemptStatus::Pending)
            .await,
        1
    );

    engine.clock.advance_days(1);
    let second = engine.sweep().await;

    assert_eq!(second.reconciled, 1);
    assert_eq!(second.charged, 0);
    assert_eq!(engine.processor.successful_charges_for("cus_slow").len(), 1);
    assert_eq!(
        engine
            .ledger
            .count_with_status(&account_id, AttemptStatus::Succeeded)
            .await,
        1
    );
    let account = engine.account(&account_id).await;
    assert_eq!(account.failure_count, 0);
    assert!(account.renewal_date.unwrap().is_after(&engine.now()));
}

#[tokio::test]
async fn unreachable_processor_does_not_abort_the_sweep() {
    let engine = Engine::new();
    let first = engine.due_account("cus_first").await;
    let second = engine.due_account("cus_second").await;
    engine
        .processor
        .set_customer_behavior("cus_first", ScriptedCharge::Transient("connection reset".into()));

    let summary = engine.sweep().await;

    assert_eq!(summary.charged, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(engine.account(&first).await.failure_count, 1);
    assert_eq!(engine.account(&second).await.failure_count, 0);
}
