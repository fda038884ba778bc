//! Storage traits for billing data.
//!
//! Implement [`BillingStore`] to back the billing flow with your database.
//! [`InMemoryBillingStore`](super::memory::InMemoryBillingStore) is provided
//! for tests and local development.

use crate::error::{BillingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::payment::PaymentSettings;
use super::plans::SubscriptionPlan;
use super::subscription::SubscriptionChange;
use super::tenant::Tenant;
use super::transaction::{PaymentTransaction, TransactionFilter, TransactionStatus};

/// Data-access interface consumed by the billing core.
///
/// All writes that touch the ledger or tenant subscription fields go
/// through [`commit`](BillingStore::commit), so that a completed payment and
/// the tenant upgrade it pays for are persisted together.
#[async_trait]
pub trait BillingStore: Send + Sync {
    // Plan catalog

    /// Get all plans in catalog order.
    async fn list_plans(&self) -> Result<Vec<SubscriptionPlan>>;

    /// Get a plan by ID.
    async fn get_plan(&self, plan_id: &str) -> Result<Option<SubscriptionPlan>>;

    /// Create or replace a plan.
    async fn save_plan(&self, plan: &SubscriptionPlan) -> Result<()>;

    // Tenants

    /// Get a tenant by ID.
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>>;

    // Payment settings

    /// Get the payment-method enablement visible to tenants.
    async fn get_payment_settings(&self) -> Result<PaymentSettings>;

    /// Replace the payment-method settings.
    async fn save_payment_settings(&self, settings: &PaymentSettings) -> Result<()>;

    // Ledger

    /// Get a transaction by ID.
    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<PaymentTransaction>>;

    /// List transactions matching a filter, newest first.
    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<PaymentTransaction>>;

    /// Apply a ledger write and/or tenant subscription change atomically.
    ///
    /// Implementations MUST perform the whole commit in one unit: a single
    /// database transaction, or a single critical section for in-process
    /// stores. In particular:
    ///
    /// - `TransactionWrite::Transition` is a compare-and-set on the current
    ///   status (`UPDATE ... WHERE id = $1 AND status = $expected`).
    /// - `TransactionWrite::Insert` with a duplicate window refuses the
    ///   insert when a matching `PENDING` row exists inside the window.
    /// - If the tenant of a subscription change does not exist, the
    ///   transaction write is still applied with `needs_reconciliation`
    ///   set, and the outcome is [`CommitOutcome::TenantMissing`].
    async fn commit(&self, commit: LedgerCommit) -> Result<CommitOutcome>;
}

/// A ledger write to perform as part of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionWrite {
    /// Append a new row.
    Insert {
        transaction: PaymentTransaction,
        /// Refuse if an identical pending row was created at or after this instant.
        duplicate_since: Option<DateTime<Utc>>,
    },
    /// Move an existing row from `expected` to `status`.
    Transition {
        transaction_id: String,
        expected: TransactionStatus,
        status: TransactionStatus,
        review_note: Option<String>,
        at: DateTime<Utc>,
    },
}

/// One atomic unit of work against the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerCommit {
    pub transaction: Option<TransactionWrite>,
    pub subscription: Option<SubscriptionChange>,
}

impl LedgerCommit {
    /// A commit that only writes to the ledger.
    #[must_use]
    pub fn ledger(write: TransactionWrite) -> Self {
        Self {
            transaction: Some(write),
            subscription: None,
        }
    }
}

/// Result of [`BillingStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Everything was applied.
    Applied {
        transaction: Option<PaymentTransaction>,
        tenant: Option<Tenant>,
    },
    /// A transition found the row in a different status. Nothing was applied.
    StatusConflict { current: TransactionStatus },
    /// An insert matched an in-flight pending row. Nothing was applied.
    Duplicate { existing_id: String },
    /// A transition referenced an unknown row. Nothing was applied.
    TransactionMissing,
    /// The tenant to update does not exist. The ledger write, if any, was
    /// applied and flagged for reconciliation.
    TenantMissing {
        transaction: Option<PaymentTransaction>,
    },
}

impl TransactionWrite {
    /// The row id and status this write would produce.
    #[must_use]
    pub fn target(&self) -> (&str, TransactionStatus) {
        match self {
            Self::Insert { transaction, .. } => (&transaction.id, transaction.status),
            Self::Transition {
                transaction_id,
                status,
                ..
            } => (transaction_id, *status),
        }
    }
}

impl CommitOutcome {
    /// Convert a refused commit into the matching error.
    ///
    /// `target` is the row id and status the commit tried to write.
    /// `Applied` and `TenantMissing` are not refusals and map to a storage
    /// error here; callers handle them before reaching this.
    pub(crate) fn into_refusal(self, target: Option<(String, TransactionStatus)>) -> BillingError {
        let (transaction_id, to) = match target {
            Some(target) => target,
            None => return BillingError::storage("commit refused without a ledger write"),
        };
        match self {
            Self::StatusConflict { current } => BillingError::InvalidTransition {
                transaction_id,
                from: current,
                to,
            },
            Self::Duplicate { existing_id } => BillingError::duplicate(format!(
                "pending transaction {} already covers this payment; wait for review before resubmitting",
                existing_id
            )),
            Self::TransactionMissing => BillingError::not_found("transaction", transaction_id),
            Self::Applied { .. } | Self::TenantMissing { .. } => {
                BillingError::storage("commit outcome is not a refusal")
            }
        }
    }
}
