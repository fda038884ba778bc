//! Tenant subscription state updates.
//!
//! [`SubscriptionUpdater`] is the only writer of a tenant's plan, billing
//! cycle and status. A completed or approved payment always leaves the
//! tenant `ACTIVE` on the purchased plan and cycle, whatever its status was
//! before. There is no proration.

use crate::error::{BillingError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::audit::{BillingAuditEvent, BillingAuditLogger};
use super::plans::BillingCycle;
use super::storage::{BillingStore, CommitOutcome, LedgerCommit, TransactionWrite};
use super::tenant::{Tenant, TenantStatus};
use super::transaction::PaymentTransaction;

/// The tenant fields written when a payment settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionChange {
    pub tenant_id: String,
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
    pub status: TenantStatus,
}

impl SubscriptionChange {
    /// Apply this change to a tenant record.
    pub fn apply_to(&self, tenant: &mut Tenant) {
        tenant.plan_id = self.plan_id.clone();
        tenant.billing_cycle = self.billing_cycle;
        tenant.status = self.status;
    }
}

/// Result of settling a ledger write together with a tenant change.
#[derive(Debug, Clone)]
pub(crate) struct Settlement {
    pub transaction: Option<PaymentTransaction>,
    pub tenant: Tenant,
}

/// Applies paid-for subscription changes to tenants.
#[derive(Clone)]
pub struct SubscriptionUpdater {
    store: Arc<dyn BillingStore>,
    audit: Arc<dyn BillingAuditLogger>,
}

impl SubscriptionUpdater {
    #[must_use]
    pub fn new(store: Arc<dyn BillingStore>, audit: Arc<dyn BillingAuditLogger>) -> Self {
        Self { store, audit }
    }

    /// Move a tenant onto a plan and cycle and mark it active.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tenant does not exist.
    pub async fn apply(
        &self,
        tenant_id: &str,
        plan_id: &str,
        billing_cycle: BillingCycle,
    ) -> Result<Tenant> {
        let settlement = self.settle(None, tenant_id, plan_id, billing_cycle).await?;
        Ok(settlement.tenant)
    }

    /// Commit a ledger write and the tenant change it pays for as one unit.
    ///
    /// When the tenant is missing the ledger write still lands, flagged for
    /// reconciliation by the store, and the mismatch is logged and audited
    /// before `NotFound` is returned.
    pub(crate) async fn settle(
        &self,
        write: Option<TransactionWrite>,
        tenant_id: &str,
        plan_id: &str,
        billing_cycle: BillingCycle,
    ) -> Result<Settlement> {
        let change = SubscriptionChange {
            tenant_id: tenant_id.to_string(),
            plan_id: plan_id.to_string(),
            billing_cycle,
            status: TenantStatus::Active,
        };
        let target = write
            .as_ref()
            .map(|w| {
                let (id, status) = w.target();
                (id.to_string(), status)
            });
        let commit = LedgerCommit {
            transaction: write,
            subscription: Some(change),
        };

        match self.store.commit(commit).await? {
            CommitOutcome::Applied {
                transaction,
                tenant: Some(tenant),
            } => {
                tracing::info!(
                    tenant_id = %tenant.id,
                    plan_id = %tenant.plan_id,
                    billing_cycle = %tenant.billing_cycle,
                    "Subscription applied"
                );
                self.audit
                    .log(BillingAuditEvent::SubscriptionApplied {
                        tenant_id: tenant.id.clone(),
                        plan_id: tenant.plan_id.clone(),
                        billing_cycle: tenant.billing_cycle,
                    })
                    .await;
                Ok(Settlement { transaction, tenant })
            }
            CommitOutcome::Applied { tenant: None, .. } => Err(BillingError::storage(
                "store applied a subscription change without returning the tenant",
            )),
            CommitOutcome::TenantMissing { transaction } => {
                let transaction_id = transaction.as_ref().map(|tx| tx.id.clone());
                tracing::error!(
                    tenant_id = %tenant_id,
                    plan_id = %plan_id,
                    transaction_id = ?transaction_id,
                    "Subscription change references a missing tenant; ledger row flagged for reconciliation"
                );
                self.audit
                    .log(BillingAuditEvent::SubscriptionMismatch {
                        tenant_id: tenant_id.to_string(),
                        plan_id: plan_id.to_string(),
                        transaction_id,
                    })
                    .await;
                Err(BillingError::not_found("tenant", tenant_id))
            }
            refused => Err(refused.into_refusal(target)),
        }
    }
}
