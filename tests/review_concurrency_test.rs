use std::sync::Arc;
use tenantpay::BillingError;
use tenantpay::billing::{
    BillingCycle, BillingService, CheckoutState, InMemoryBillingStore, NoOpAuditLogger,
    PaymentMethod, PaymentSubmission, ProofUpload, SimulatedGateway, SubscriptionPlan, Tenant,
    TransactionStatus,
};
use tokio::task::JoinSet;

fn service(store: &InMemoryBillingStore) -> BillingService {
    BillingService::builder()
        .with_store(Arc::new(store.clone()))
        .with_gateway(Arc::new(
            SimulatedGateway::new().with_latency(std::time::Duration::from_millis(20)),
        ))
        .with_audit_logger(Arc::new(NoOpAuditLogger))
        .build()
        .unwrap()
}

fn seeded_store(tenants: usize) -> InMemoryBillingStore {
    let store = InMemoryBillingStore::new();
    store.seed_plans([
        SubscriptionPlan::new("basic", "Basic").prices(1_900, 19_000),
        SubscriptionPlan::new("pro", "Pro").prices(4_900, 49_000),
    ]);
    for i in 0..tenants {
        store.seed_tenant(Tenant::new(format!("t{i}"), "basic"));
    }
    store
}

async fn pending_manual(billing: &BillingService, tenant_id: &str) -> String {
    let checkout = billing.checkout();
    let session = checkout
        .start_checkout(tenant_id, "pro", BillingCycle::Monthly)
        .await
        .unwrap();
    let proof = checkout
        .upload_proof(
            &session.id,
            ProofUpload::new("receipt.jpg", "image/jpeg", vec![0xff, 0xd8, 0xff]),
        )
        .await
        .unwrap();
    let outcome = checkout
        .submit_payment(&session.id, PaymentSubmission::manual(Some(proof)))
        .await
        .unwrap();
    outcome.result.transaction.id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approve_and_reject_has_one_winner() {
    for _ in 0..20 {
        let store = seeded_store(1);
        let billing = service(&store);
        let tx_id = pending_manual(&billing, "t0").await;

        let approve = {
            let billing = billing.clone();
            let tx_id = tx_id.clone();
            tokio::spawn(async move { billing.review().approve(&tx_id).await })
        };
        let reject = {
            let billing = billing.clone();
            let tx_id = tx_id.clone();
            tokio::spawn(async move { billing.review().reject(&tx_id).await })
        };
        let approved = approve.await.unwrap();
        let rejected = reject.await.unwrap();

        assert!(approved.is_ok() != rejected.is_ok(), "exactly one review must win");
        let loser = approved.as_ref().err().or(rejected.as_ref().err()).unwrap();
        assert!(matches!(loser, BillingError::InvalidTransition { .. }));

        let row = billing.ledger().get(&tx_id).await.unwrap();
        let tenant = store.tenant("t0").unwrap();
        if approved.is_ok() {
            assert_eq!(row.status, TransactionStatus::Completed);
            assert_eq!(tenant.plan_id, "pro");
        } else {
            assert_eq!(row.status, TransactionStatus::Rejected);
            assert_eq!(tenant.plan_id, "basic");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_apply_once() {
    let store = seeded_store(1);
    let billing = service(&store);
    let tx_id = pending_manual(&billing, "t0").await;

    let mut set = JoinSet::new();
    for _ in 0..8 {
        let billing = billing.clone();
        let tx_id = tx_id.clone();
        set.spawn(async move { billing.review().approve(&tx_id).await });
    }

    let mut wins = 0;
    while let Some(result) = set.join_next().await {
        match result.unwrap() {
            Ok(tx) => {
                wins += 1;
                assert_eq!(tx.status, TransactionStatus::Completed);
            }
            Err(err) => assert!(matches!(
                err,
                BillingError::InvalidTransition { from: TransactionStatus::Completed, .. }
            )),
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_transactions_review_in_parallel() {
    let store = seeded_store(6);
    let billing = service(&store);

    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(pending_manual(&billing, &format!("t{i}")).await);
    }

    let mut set = JoinSet::new();
    for (i, tx_id) in ids.into_iter().enumerate() {
        let billing = billing.clone();
        set.spawn(async move {
            if i % 2 == 0 {
                billing.review().approve(&tx_id).await
            } else {
                billing.review().reject(&tx_id).await
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.unwrap().unwrap();
    }

    for i in 0..6 {
        let expected = if i % 2 == 0 { "pro" } else { "basic" };
        assert_eq!(store.tenant(&format!("t{i}")).unwrap().plan_id, expected);
    }
    assert!(billing.review().pending().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_submissions_enter_processing_once() {
    let store = seeded_store(1);
    let billing = service(&store);
    let session = billing
        .checkout()
        .start_checkout("t0", "pro", BillingCycle::Yearly)
        .await
        .unwrap();

    let mut set = JoinSet::new();
    for _ in 0..4 {
        let billing = billing.clone();
        let session_id = session.id.clone();
        set.spawn(async move {
            billing
                .checkout()
                .submit_payment(&session_id, PaymentSubmission::online(PaymentMethod::Paystack))
                .await
        });
    }

    let mut successes = 0;
    while let Some(result) = set.join_next().await {
        match result.unwrap() {
            Ok(outcome) => {
                successes += 1;
                assert_eq!(outcome.session.state, CheckoutState::Success);
            }
            Err(err) => assert!(matches!(
                err,
                BillingError::Duplicate(_) | BillingError::Validation(_)
            )),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.transactions().len(), 1);
    assert_eq!(store.tenant("t0").unwrap().plan_id, "pro");
}

#[tokio::test]
async fn test_missing_tenant_on_approval_is_flagged() {
    let store = seeded_store(1);
    let billing = service(&store);
    let tx_id = pending_manual(&billing, "t0").await;
    store.remove_tenant("t0");

    let err = billing.review().approve(&tx_id).await.unwrap_err();
    assert_eq!(err, BillingError::not_found("tenant", "t0"));
    assert!(err.requires_alert());

    let flagged = billing.review().flagged().await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].id, tx_id);
    assert_eq!(flagged[0].status, TransactionStatus::Completed);
    assert!(flagged[0].needs_reconciliation);
}
