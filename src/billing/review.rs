//! Admin review of manual payments.

use crate::error::{BillingError, Result};
use std::sync::Arc;

use super::audit::{BillingAuditEvent, BillingAuditLogger};
use super::ledger::TransactionLedger;
use super::transaction::{PaymentMethod, PaymentTransaction, TransactionFilter, TransactionStatus};
use super::validation::validate_review_note;

/// Queue of manual payments waiting for an operator decision.
///
/// Approving applies the purchased plan to the tenant. Rejecting only
/// settles the ledger row; the tenant is never touched.
#[derive(Clone)]
pub struct AdminReviewQueue {
    ledger: TransactionLedger,
    audit: Arc<dyn BillingAuditLogger>,
}

impl AdminReviewQueue {
    #[must_use]
    pub fn new(ledger: TransactionLedger, audit: Arc<dyn BillingAuditLogger>) -> Self {
        Self { ledger, audit }
    }

    /// Pending manual payments, oldest first.
    pub async fn pending(&self) -> Result<Vec<PaymentTransaction>> {
        let filter = TransactionFilter::new()
            .status(TransactionStatus::Pending)
            .method(PaymentMethod::Manual);
        let mut pending = self.ledger.list(&filter).await?;
        pending.reverse();
        Ok(pending)
    }

    pub async fn get(&self, transaction_id: &str) -> Result<PaymentTransaction> {
        self.ledger.get(transaction_id).await
    }

    /// Rows whose tenant could not be updated when they settled.
    pub async fn flagged(&self) -> Result<Vec<PaymentTransaction>> {
        self.ledger.list(&TransactionFilter::new().flagged()).await
    }

    /// Approve a pending manual payment and activate the tenant on its plan.
    pub async fn approve(&self, transaction_id: &str) -> Result<PaymentTransaction> {
        let current = self.reviewable(transaction_id, TransactionStatus::Completed).await?;
        let approved = self
            .ledger
            .transition(&current, TransactionStatus::Completed, None)
            .await?;

        self.audit
            .log(BillingAuditEvent::TransactionApproved {
                transaction_id: approved.id.clone(),
                tenant_id: approved.tenant_id.clone(),
            })
            .await;
        Ok(approved)
    }

    /// Reject a pending manual payment.
    pub async fn reject(&self, transaction_id: &str) -> Result<PaymentTransaction> {
        self.reject_with_note(transaction_id, None).await
    }

    /// Reject a pending manual payment, recording the operator's reason.
    pub async fn reject_with_note(
        &self,
        transaction_id: &str,
        note: Option<String>,
    ) -> Result<PaymentTransaction> {
        let note = validate_review_note(note)?;
        let current = self.reviewable(transaction_id, TransactionStatus::Rejected).await?;
        let rejected = self
            .ledger
            .transition(&current, TransactionStatus::Rejected, note)
            .await?;

        self.audit
            .log(BillingAuditEvent::TransactionRejected {
                transaction_id: rejected.id.clone(),
                tenant_id: rejected.tenant_id.clone(),
                note: rejected.review_note.clone(),
            })
            .await;
        Ok(rejected)
    }

    async fn reviewable(
        &self,
        transaction_id: &str,
        target: TransactionStatus,
    ) -> Result<PaymentTransaction> {
        let current = self.ledger.get(transaction_id).await?;
        if current.method != PaymentMethod::Manual {
            tracing::warn!(
                transaction_id = %current.id,
                method = %current.method,
                "Refused review of a non-manual transaction"
            );
            return Err(BillingError::InvalidTransition {
                transaction_id: current.id,
                from: current.status,
                to: target,
            });
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::audit::RecordingAuditLogger;
    use crate::billing::memory::InMemoryBillingStore;
    use crate::billing::plans::BillingCycle;
    use crate::billing::proof::ProofReference;
    use crate::billing::storage::BillingStore;
    use crate::billing::subscription::SubscriptionUpdater;
    use crate::billing::tenant::{Tenant, TenantStatus};
    use crate::billing::transaction::NewTransaction;
    use std::time::Duration;

    fn setup() -> (InMemoryBillingStore, TransactionLedger, AdminReviewQueue) {
        let store = InMemoryBillingStore::new();
        store.seed_tenant(Tenant::new("t1", "basic").with_status(TenantStatus::Trial));
        let shared: Arc<dyn BillingStore> = Arc::new(store.clone());
        let audit = Arc::new(RecordingAuditLogger::new());
        let updater = SubscriptionUpdater::new(shared.clone(), audit.clone());
        let ledger = TransactionLedger::new(shared, updater, audit.clone(), Duration::ZERO);
        let review = AdminReviewQueue::new(ledger.clone(), audit);
        (store, ledger, review)
    }

    async fn manual(ledger: &TransactionLedger, plan_id: &str) -> PaymentTransaction {
        ledger
            .create(NewTransaction {
                tenant_id: "t1".to_string(),
                plan_id: plan_id.to_string(),
                billing_cycle: BillingCycle::Monthly,
                amount_cents: 4_900,
                method: PaymentMethod::Manual,
                status: TransactionStatus::Pending,
                proof: Some(ProofReference::new("memory://proofs/t1/receipt.png").unwrap()),
                gateway_reference: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_pending_oldest_first() {
        let (_store, ledger, review) = setup();
        let first = manual(&ledger, "pro").await;
        let second = manual(&ledger, "team").await;

        let pending = review.pending().await.unwrap();
        assert_eq!(
            pending.iter().map(|tx| tx.id.clone()).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
    }

    #[tokio::test]
    async fn test_approve_once() {
        let (store, ledger, review) = setup();
        let tx = manual(&ledger, "pro").await;

        let approved = review.approve(&tx.id).await.unwrap();
        assert_eq!(approved.status, TransactionStatus::Completed);
        assert!(approved.reviewed_at.is_some());
        assert_eq!(store.tenant("t1").unwrap().status, TenantStatus::Active);

        let err = review.approve(&tx.id).await.unwrap_err();
        assert!(matches!(
            err,
            BillingError::InvalidTransition { from: TransactionStatus::Completed, .. }
        ));
        assert!(review.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject_keeps_tenant() {
        let (store, ledger, review) = setup();
        let before = store.tenant("t1").unwrap();
        let tx = manual(&ledger, "pro").await;

        let rejected = review
            .reject_with_note(&tx.id, Some("amount does not match".to_string()))
            .await
            .unwrap();
        assert_eq!(rejected.status, TransactionStatus::Rejected);
        assert_eq!(rejected.review_note.as_deref(), Some("amount does not match"));
        assert_eq!(store.tenant("t1").unwrap(), before);

        assert!(review.approve(&tx.id).await.is_err());
        assert_eq!(store.tenant("t1").unwrap(), before);
    }

    #[tokio::test]
    async fn test_online_rows_are_not_reviewable() {
        let (_store, ledger, review) = setup();
        let failed = ledger
            .create(NewTransaction {
                tenant_id: "t1".to_string(),
                plan_id: "pro".to_string(),
                billing_cycle: BillingCycle::Monthly,
                amount_cents: 4_900,
                method: PaymentMethod::Stripe,
                status: TransactionStatus::Failed,
                proof: None,
                gateway_reference: None,
            })
            .await
            .unwrap();

        let err = review.approve(&failed.id).await.unwrap_err();
        assert_eq!(
            err,
            BillingError::InvalidTransition {
                transaction_id: failed.id.clone(),
                from: TransactionStatus::Failed,
                to: TransactionStatus::Completed,
            }
        );
        assert!(matches!(review.get("nope").await, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_flagged_lists_reconciliation_rows() {
        let (store, ledger, review) = setup();
        let tx = manual(&ledger, "pro").await;
        store.remove_tenant("t1");

        assert!(review.approve(&tx.id).await.is_err());
        let flagged = review.flagged().await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].id, tx.id);
    }
}
