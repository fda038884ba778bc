//! Wiring of the billing components around shared collaborators.

use crate::config::CheckoutConfig;
use crate::error::{BillingError, Result};
use std::sync::Arc;

use super::audit::{BillingAuditLogger, TracingAuditLogger};
use super::checkout::CheckoutOrchestrator;
use super::ledger::TransactionLedger;
use super::memory::InMemoryProofStorage;
use super::payment::{PaymentAdapter, PaymentGateway, SimulatedGateway};
use super::plans::PlanCatalog;
use super::proof::ProofStorage;
use super::review::AdminReviewQueue;
use super::storage::BillingStore;
use super::subscription::SubscriptionUpdater;

/// Every billing component, built over one store.
///
/// Cheap to clone; clones share sessions and collaborators. This is the
/// state the HTTP router runs on.
#[derive(Clone)]
pub struct BillingService {
    catalog: PlanCatalog,
    checkout: CheckoutOrchestrator,
    ledger: TransactionLedger,
    review: AdminReviewQueue,
    subscriptions: SubscriptionUpdater,
}

impl BillingService {
    /// Builder pattern for constructing BillingService
    pub fn builder() -> BillingServiceBuilder {
        BillingServiceBuilder::new()
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.checkout
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn review(&self) -> &AdminReviewQueue {
        &self.review
    }

    pub fn subscriptions(&self) -> &SubscriptionUpdater {
        &self.subscriptions
    }
}

/// Builder for BillingService with fluent API
///
/// Only the store is required. Proofs default to [`InMemoryProofStorage`],
/// the gateway to [`SimulatedGateway`] and audit events go to tracing.
#[must_use = "builder does nothing until you call build()"]
pub struct BillingServiceBuilder {
    store: Option<Arc<dyn BillingStore>>,
    proofs: Option<Arc<dyn ProofStorage>>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    audit: Option<Arc<dyn BillingAuditLogger>>,
    config: CheckoutConfig,
}

impl BillingServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            proofs: None,
            gateway: None,
            audit: None,
            config: CheckoutConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn BillingStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_proof_storage(mut self, proofs: Arc<dyn ProofStorage>) -> Self {
        self.proofs = Some(proofs);
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn BillingAuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_config(mut self, config: CheckoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble the components.
    ///
    /// # Errors
    ///
    /// `Config` if no store was set.
    pub fn build(self) -> Result<BillingService> {
        let store = self
            .store
            .ok_or_else(|| BillingError::config("billing store not configured"))?;
        let proofs = self
            .proofs
            .unwrap_or_else(|| Arc::new(InMemoryProofStorage::new()));
        let config = self.config;
        let gateway = self.gateway.unwrap_or_else(|| {
            Arc::new(SimulatedGateway::new().with_latency(config.gateway_latency()))
        });
        let audit = self.audit.unwrap_or_else(|| Arc::new(TracingAuditLogger));

        let subscriptions = SubscriptionUpdater::new(store.clone(), audit.clone());
        let ledger = TransactionLedger::new(
            store.clone(),
            subscriptions.clone(),
            audit.clone(),
            config.duplicate_window(),
        );
        let adapter = PaymentAdapter::new(store.clone(), ledger.clone(), gateway);
        let checkout = CheckoutOrchestrator::new(store.clone(), adapter, proofs, audit.clone(), config);
        let review = AdminReviewQueue::new(ledger.clone(), audit);

        Ok(BillingService {
            catalog: PlanCatalog::new(store),
            checkout,
            ledger,
            review,
            subscriptions,
        })
    }
}

impl Default for BillingServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
