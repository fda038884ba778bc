//! In-memory implementations of the billing collaborators.
//!
//! Suitable for tests and local development. Data is lost when the process
//! exits. Every [`BillingStore::commit`] runs inside one write lock, which
//! gives the atomicity the trait requires.

use crate::error::{BillingError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::payment::PaymentSettings;
use super::plans::SubscriptionPlan;
use super::proof::{ProofReference, ProofStorage, ProofUpload};
use super::storage::{BillingStore, CommitOutcome, LedgerCommit, TransactionWrite};
use super::tenant::Tenant;
use super::transaction::{PaymentTransaction, TransactionFilter, TransactionStatus};

/// In-memory billing store.
///
/// Wraps data in Arc for cheap cloning; clones share state.
#[derive(Default, Clone)]
pub struct InMemoryBillingStore {
    inner: Arc<RwLock<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    plans: Vec<SubscriptionPlan>,
    tenants: HashMap<String, Tenant>,
    settings: PaymentSettings,
    // Insertion order.
    transactions: Vec<PaymentTransaction>,
}

impl InMemoryBillingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.inner
            .read()
            .map_err(|_| BillingError::storage("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .write()
            .map_err(|_| BillingError::storage("in-memory store lock poisoned"))
    }

    /// Seed plans, replacing any with the same id.
    pub fn seed_plans(&self, plans: impl IntoIterator<Item = SubscriptionPlan>) {
        if let Ok(mut state) = self.write() {
            for plan in plans {
                upsert_plan(&mut state.plans, plan);
            }
        }
    }

    /// Seed or replace a tenant.
    pub fn seed_tenant(&self, tenant: Tenant) {
        if let Ok(mut state) = self.write() {
            state.tenants.insert(tenant.id.clone(), tenant);
        }
    }

    /// Remove a tenant, e.g. to simulate an account deleted mid-review.
    pub fn remove_tenant(&self, tenant_id: &str) -> Option<Tenant> {
        self.write().ok()?.tenants.remove(tenant_id)
    }

    /// Seed payment settings.
    pub fn seed_payment_settings(&self, settings: PaymentSettings) {
        if let Ok(mut state) = self.write() {
            state.settings = settings;
        }
    }

    /// Current snapshot of a tenant.
    #[must_use]
    pub fn tenant(&self, tenant_id: &str) -> Option<Tenant> {
        self.read().ok()?.tenants.get(tenant_id).cloned()
    }

    /// All ledger rows in insertion order.
    #[must_use]
    pub fn transactions(&self) -> Vec<PaymentTransaction> {
        self.read()
            .map(|state| state.transactions.clone())
            .unwrap_or_default()
    }
}

fn upsert_plan(plans: &mut Vec<SubscriptionPlan>, plan: SubscriptionPlan) {
    match plans.iter_mut().find(|p| p.id == plan.id) {
        Some(existing) => *existing = plan,
        None => plans.push(plan),
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn list_plans(&self) -> Result<Vec<SubscriptionPlan>> {
        Ok(self.read()?.plans.clone())
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<SubscriptionPlan>> {
        Ok(self.read()?.plans.iter().find(|p| p.id == plan_id).cloned())
    }

    async fn save_plan(&self, plan: &SubscriptionPlan) -> Result<()> {
        upsert_plan(&mut self.write()?.plans, plan.clone());
        Ok(())
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        Ok(self.read()?.tenants.get(tenant_id).cloned())
    }

    async fn get_payment_settings(&self) -> Result<PaymentSettings> {
        Ok(self.read()?.settings.clone())
    }

    async fn save_payment_settings(&self, settings: &PaymentSettings) -> Result<()> {
        self.write()?.settings = settings.clone();
        Ok(())
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<PaymentTransaction>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .find(|tx| tx.id == transaction_id)
            .cloned())
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<PaymentTransaction>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .rev()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect())
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<CommitOutcome> {
        let mut state = self.write()?;

        // Check every precondition before touching anything.
        match &commit.transaction {
            Some(TransactionWrite::Insert {
                transaction,
                duplicate_since: Some(since),
            }) => {
                let existing = state.transactions.iter().find(|tx| {
                    tx.status == TransactionStatus::Pending
                        && tx.tenant_id == transaction.tenant_id
                        && tx.plan_id == transaction.plan_id
                        && tx.amount_cents == transaction.amount_cents
                        && tx.created_at >= *since
                });
                if let Some(existing) = existing {
                    return Ok(CommitOutcome::Duplicate {
                        existing_id: existing.id.clone(),
                    });
                }
            }
            Some(TransactionWrite::Transition {
                transaction_id,
                expected,
                ..
            }) => match state.transactions.iter().find(|tx| &tx.id == transaction_id) {
                None => return Ok(CommitOutcome::TransactionMissing),
                Some(tx) if tx.status != *expected => {
                    return Ok(CommitOutcome::StatusConflict { current: tx.status });
                }
                Some(_) => {}
            },
            _ => {}
        }

        let tenant_missing = commit
            .subscription
            .as_ref()
            .is_some_and(|change| !state.tenants.contains_key(&change.tenant_id));

        let transaction = match commit.transaction {
            Some(TransactionWrite::Insert { mut transaction, .. }) => {
                transaction.needs_reconciliation |= tenant_missing;
                state.transactions.push(transaction.clone());
                Some(transaction)
            }
            Some(TransactionWrite::Transition {
                transaction_id,
                status,
                review_note,
                at,
                ..
            }) => {
                let tx = state
                    .transactions
                    .iter_mut()
                    .find(|tx| tx.id == transaction_id)
                    .ok_or_else(|| BillingError::storage("transaction vanished inside commit"))?;
                tx.status = status;
                tx.updated_at = at;
                tx.reviewed_at = Some(at);
                if review_note.is_some() {
                    tx.review_note = review_note;
                }
                tx.needs_reconciliation |= tenant_missing;
                Some(tx.clone())
            }
            None => None,
        };

        let Some(change) = commit.subscription else {
            return Ok(CommitOutcome::Applied {
                transaction,
                tenant: None,
            });
        };

        match state.tenants.get_mut(&change.tenant_id) {
            Some(tenant) => {
                change.apply_to(tenant);
                Ok(CommitOutcome::Applied {
                    transaction,
                    tenant: Some(tenant.clone()),
                })
            }
            None => Ok(CommitOutcome::TenantMissing { transaction }),
        }
    }
}

/// In-memory proof-of-payment storage.
#[derive(Default, Clone)]
pub struct InMemoryProofStorage {
    files: Arc<DashMap<String, StoredProof>>,
}

/// A stored proof file.
#[derive(Debug, Clone)]
pub struct StoredProof {
    pub tenant_id: String,
    pub content_type: String,
    pub data: Bytes,
}

impl InMemoryProofStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored file by reference.
    #[must_use]
    pub fn get(&self, reference: &ProofReference) -> Option<StoredProof> {
        self.files.get(reference.as_str()).map(|entry| entry.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl ProofStorage for InMemoryProofStorage {
    async fn store_proof(&self, tenant_id: &str, upload: ProofUpload) -> Result<ProofReference> {
        let key = format!(
            "memory://proofs/{}/{}-{}",
            tenant_id,
            uuid::Uuid::new_v4(),
            upload.sanitized_name()
        );
        self.files.insert(
            key.clone(),
            StoredProof {
                tenant_id: tenant_id.to_string(),
                content_type: upload.content_type,
                data: upload.data,
            },
        );
        ProofReference::new(key)
    }

    async fn exists(&self, reference: &ProofReference, tenant_id: &str) -> Result<bool> {
        Ok(self
            .files
            .get(reference.as_str())
            .is_some_and(|file| file.tenant_id == tenant_id))
    }
}
