//! Transaction ledger.
//!
//! The ledger is the single source of truth for payment status. Rows are
//! appended once per attempt; afterwards the only mutation is settling a
//! `PENDING` row to `COMPLETED` or `REJECTED`. Settling is a compare-and-set
//! on the status the caller observed, so two reviewers racing on the same
//! row produce exactly one winner.

use crate::error::{BillingError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::audit::{BillingAuditEvent, BillingAuditLogger};
use super::storage::{BillingStore, CommitOutcome, LedgerCommit, TransactionWrite};
use super::subscription::SubscriptionUpdater;
use super::transaction::{NewTransaction, PaymentTransaction, TransactionFilter, TransactionStatus};

/// Append-mostly store of payment attempts.
#[derive(Clone)]
pub struct TransactionLedger {
    store: Arc<dyn BillingStore>,
    updater: SubscriptionUpdater,
    audit: Arc<dyn BillingAuditLogger>,
    duplicate_window: Duration,
}

impl TransactionLedger {
    /// Create a ledger.
    ///
    /// A zero `duplicate_window` disables the duplicate-submission check.
    #[must_use]
    pub fn new(
        store: Arc<dyn BillingStore>,
        updater: SubscriptionUpdater,
        audit: Arc<dyn BillingAuditLogger>,
        duplicate_window: Duration,
    ) -> Self {
        Self {
            store,
            updater,
            audit,
            duplicate_window,
        }
    }

    /// Record a new payment attempt.
    ///
    /// A `COMPLETED` row is committed together with the tenant upgrade it
    /// pays for. A `PENDING` row is refused with `Duplicate` if an identical
    /// one (same tenant, plan and amount) was recorded inside the window.
    pub async fn create(&self, new: NewTransaction) -> Result<PaymentTransaction> {
        if new.amount_cents < 0 {
            return Err(BillingError::validation("transaction amount cannot be negative"));
        }
        if new.status == TransactionStatus::Rejected {
            return Err(BillingError::validation(
                "transactions can only be rejected through review",
            ));
        }

        let transaction = new.into_transaction();
        let duplicate_since = if transaction.status == TransactionStatus::Pending {
            chrono::Duration::from_std(self.duplicate_window)
                .ok()
                .filter(|window| !window.is_zero())
                .map(|window| transaction.created_at - window)
        } else {
            None
        };
        let target = (transaction.id.clone(), transaction.status);
        let (tenant_id, plan_id, cycle) = (
            transaction.tenant_id.clone(),
            transaction.plan_id.clone(),
            transaction.billing_cycle,
        );
        let write = TransactionWrite::Insert {
            transaction,
            duplicate_since,
        };

        let recorded = if target.1 == TransactionStatus::Completed {
            self.updater
                .settle(Some(write), &tenant_id, &plan_id, cycle)
                .await?
                .transaction
        } else {
            match self.store.commit(LedgerCommit::ledger(write)).await? {
                CommitOutcome::Applied { transaction, .. } => transaction,
                refused => return Err(refused.into_refusal(Some(target))),
            }
        };
        let recorded =
            recorded.ok_or_else(|| BillingError::storage("store did not return the recorded transaction"))?;

        tracing::info!(
            transaction_id = %recorded.id,
            tenant_id = %recorded.tenant_id,
            plan_id = %recorded.plan_id,
            method = %recorded.method,
            status = %recorded.status,
            amount_cents = recorded.amount_cents,
            "Transaction recorded"
        );
        self.audit
            .log(BillingAuditEvent::TransactionRecorded {
                transaction_id: recorded.id.clone(),
                tenant_id: recorded.tenant_id.clone(),
                plan_id: recorded.plan_id.clone(),
                method: recorded.method,
                status: recorded.status,
                amount_cents: recorded.amount_cents,
            })
            .await;

        Ok(recorded)
    }

    /// Move a row to a new status.
    ///
    /// Only `PENDING → COMPLETED` and `PENDING → REJECTED` are legal.
    /// Completing a row applies the purchased plan to its tenant in the same
    /// commit.
    pub async fn update_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
    ) -> Result<PaymentTransaction> {
        let current = self.get(transaction_id).await?;
        self.transition(&current, status, None).await
    }

    /// Settle `current` to `status`, provided the row still has the status
    /// `current` was read with.
    pub(crate) async fn transition(
        &self,
        current: &PaymentTransaction,
        status: TransactionStatus,
        review_note: Option<String>,
    ) -> Result<PaymentTransaction> {
        if !current.status.can_transition_to(status) {
            return Err(self.refuse(&current.id, current.status, status));
        }

        let write = TransactionWrite::Transition {
            transaction_id: current.id.clone(),
            expected: current.status,
            status,
            review_note,
            at: Utc::now(),
        };

        let result = if status == TransactionStatus::Completed {
            // Match on the row's plan, not the tenant's live plan.
            self.updater
                .settle(
                    Some(write),
                    &current.tenant_id,
                    &current.plan_id,
                    current.billing_cycle,
                )
                .await
                .and_then(|settlement| {
                    settlement
                        .transaction
                        .ok_or_else(|| BillingError::storage("store did not return the settled transaction"))
                })
        } else {
            match self.store.commit(LedgerCommit::ledger(write)).await? {
                CommitOutcome::Applied {
                    transaction: Some(transaction),
                    ..
                } => Ok(transaction),
                CommitOutcome::Applied { transaction: None, .. } => {
                    Err(BillingError::storage("store did not return the settled transaction"))
                }
                refused => Err(refused.into_refusal(Some((current.id.clone(), status)))),
            }
        };

        match result {
            Ok(settled) => {
                tracing::info!(
                    transaction_id = %settled.id,
                    tenant_id = %settled.tenant_id,
                    from = %current.status,
                    to = %settled.status,
                    "Transaction settled"
                );
                Ok(settled)
            }
            Err(BillingError::InvalidTransition { transaction_id, from, to }) => {
                Err(self.refuse(&transaction_id, from, to))
            }
            Err(err) => Err(err),
        }
    }

    fn refuse(
        &self,
        transaction_id: &str,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> BillingError {
        tracing::warn!(
            transaction_id = %transaction_id,
            from = %from,
            to = %to,
            "Refused ledger transition"
        );
        BillingError::InvalidTransition {
            transaction_id: transaction_id.to_string(),
            from,
            to,
        }
    }

    /// Get a row, failing with `NotFound` if it does not exist.
    pub async fn get(&self, transaction_id: &str) -> Result<PaymentTransaction> {
        self.store
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| BillingError::not_found("transaction", transaction_id))
    }

    /// Rows matching a filter, newest first.
    pub async fn list(&self, filter: &TransactionFilter) -> Result<Vec<PaymentTransaction>> {
        self.store.list_transactions(filter).await
    }

    /// A tenant's payment history, newest first.
    pub async fn history(&self, tenant_id: &str) -> Result<Vec<PaymentTransaction>> {
        self.list(&TransactionFilter::new().tenant(tenant_id)).await
    }
}
