//! Workspace consequences of an account reaching the failure threshold.

mod common;

use common::Engine;

use hearth_billing::adapters::stripe::ScriptedCharge;
use hearth_billing::domain::foundation::{AccountId, WorkspaceId};
use hearth_billing::domain::workspace::Privilege;
use hearth_billing::ports::MembershipStore;

/// Due account whose card is declined on every attempt.
async fn failing_account(engine: &Engine, customer_id: &str) -> AccountId {
    let id = engine.due_account(customer_id).await;
    engine
        .processor
        .set_customer_behavior(customer_id, ScriptedCharge::Decline("card_declined".into()));
    id
}

/// Three nightly sweeps on consecutive days.
async fn run_three_nights(engine: &Engine) {
    for _ in 0..3 {
        engine.sweep().await;
        engine.clock.advance_days(1);
    }
}

async fn is_restricted(engine: &Engine, workspace_id: &WorkspaceId) -> bool {
    engine
        .memberships
        .find_workspace(workspace_id)
        .await
        .unwrap()
        .unwrap()
        .is_restricted(engine.now())
}

#[tokio::test]
async fn sole_elevated_holder_restricts_the_workspace() {
    let engine = Engine::new();
    let failing = failing_account(&engine, "cus_sole").await;
    let (workspace_id, memberships) = engine.memberships.seed_workspace(&[failing]).await;

    run_three_nights(&engine).await;

    assert!(is_restricted(&engine, &workspace_id).await);
    let membership = engine.memberships.membership(&memberships[0].id).await.unwrap();
    assert_eq!(membership.privilege, Privilege::Elevated);
    assert_eq!(engine.audit.count("workspace.restricted").await, 1);
    assert_eq!(engine.audit.count("workspace.role_demoted").await, 0);
}

#[tokio::test]
async fn covered_workspace_only_demotes_the_failing_holder() {
    let engine = Engine::new();
    let failing = failing_account(&engine, "cus_failing").await;
    let paying = engine.paying_account("cus_paying").await;
    let (workspace_id, memberships) = engine
        .memberships
        .seed_workspace(&[failing, paying])
        .await;

    run_three_nights(&engine).await;

    assert!(!is_restricted(&engine, &workspace_id).await);
    let demoted = engine.memberships.membership(&memberships[0].id).await.unwrap();
    let untouched = engine.memberships.membership(&memberships[1].id).await.unwrap();
    assert_eq!(demoted.privilege, Privilege::Standard);
    assert_eq!(untouched.privilege, Privilege::Elevated);
    assert_eq!(engine.audit.count("workspace.role_demoted").await, 1);
    assert_eq!(engine.audit.count("workspace.restricted").await, 0);

    let holders = engine
        .memberships
        .list_elevated_holders(&workspace_id)
        .await
        .unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].account_id, paying);
}

#[tokio::test]
async fn trial_co_holder_does_not_cover_the_workspace() {
    let engine = Engine::new();
    let failing = failing_account(&engine, "cus_failing").await;
    let trial = engine.trial_account().await;
    let (workspace_id, memberships) = engine
        .memberships
        .seed_workspace(&[failing, trial])
        .await;

    run_three_nights(&engine).await;

    assert!(is_restricted(&engine, &workspace_id).await);
    for membership in &memberships {
        let current = engine.memberships.membership(&membership.id).await.unwrap();
        assert_eq!(current.privilege, Privilege::Elevated);
    }
}

#[tokio::test]
async fn each_workspace_is_decided_on_its_own() {
    let engine = Engine::new();
    let failing = failing_account(&engine, "cus_failing").await;
    let paying = engine.paying_account("cus_paying").await;
    let (solo, _) = engine.memberships.seed_workspace(&[failing]).await;
    let (shared, shared_memberships) = engine
        .memberships
        .seed_workspace(&[failing, paying])
        .await;

    run_three_nights(&engine).await;

    assert!(is_restricted(&engine, &solo).await);
    assert!(!is_restricted(&engine, &shared).await);
    let demoted = engine
        .memberships
        .membership(&shared_memberships[0].id)
        .await
        .unwrap();
    assert_eq!(demoted.privilege, Privilege::Standard);
    assert_eq!(engine.audit.count("billing.account_terminated").await, 1);
}

#[tokio::test]
async fn two_holders_failing_together_leave_the_workspace_restricted() {
    let engine = Engine::new();
    let first = failing_account(&engine, "cus_first").await;
    let second = failing_account(&engine, "cus_second").await;
    let (workspace_id, memberships) = engine
        .memberships
        .seed_workspace(&[first, second])
        .await;

    run_three_nights(&engine).await;

    // Whichever terminates first is still covered by the other and gets
    // demoted; the second finds no other elevated holder.
    assert!(is_restricted(&engine, &workspace_id).await);
    let mut privileges = Vec::new();
    for membership in &memberships {
        privileges.push(
            engine
                .memberships
                .membership(&membership.id)
                .await
                .unwrap()
                .privilege,
        );
    }
    assert_eq!(
        privileges
            .iter()
            .filter(|p| **p == Privilege::Standard)
            .count(),
        1
    );
    assert_eq!(engine.audit.count("billing.account_terminated").await, 2);
}
