//! Subscription billing and payment reconciliation for multi-tenant SaaS.
//!
//! A tenant picks a plan and billing cycle, pays through an online gateway
//! or by manual bank transfer, and ends up active on the purchased plan.
//! Online payments settle immediately; manual ones wait in a review queue
//! until an operator approves or rejects the uploaded proof.
//!
//! Every attempt is a row in the [`TransactionLedger`]. A row and the
//! tenant change it pays for are committed together through
//! [`BillingStore::commit`], so a paid-for plan is never lost and a tenant
//! is never upgraded without a matching `COMPLETED` row.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tenantpay::billing::{
//!     BillingCycle, BillingService, InMemoryBillingStore, PaymentMethod,
//!     PaymentSubmission, SubscriptionPlan, Tenant,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tenantpay::Result<()> {
//! let store = InMemoryBillingStore::new();
//! store.seed_plans([
//!     SubscriptionPlan::new("basic", "Basic").prices(1_900, 19_000),
//!     SubscriptionPlan::new("pro", "Pro").prices(4_900, 49_000),
//! ]);
//! store.seed_tenant(Tenant::new("acme", "basic"));
//!
//! let billing = BillingService::builder()
//!     .with_store(Arc::new(store.clone()))
//!     .build()?;
//!
//! let session = billing
//!     .checkout()
//!     .start_checkout("acme", "pro", BillingCycle::Yearly)
//!     .await?;
//! let outcome = billing
//!     .checkout()
//!     .submit_payment(&session.id, PaymentSubmission::online(PaymentMethod::Stripe))
//!     .await?;
//!
//! assert!(outcome.result.success);
//! assert_eq!(store.tenant("acme").unwrap().plan_id, "pro");
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod checkout;
pub mod ledger;
pub mod memory;
pub mod payment;
pub mod plans;
pub mod proof;
pub mod review;
pub mod service;
pub mod storage;
pub mod subscription;
pub mod tenant;
pub mod transaction;
pub mod validation;

// Audit exports
pub use audit::{BillingAuditEvent, BillingAuditLogger, NoOpAuditLogger, RecordingAuditLogger, TracingAuditLogger};

// Checkout exports
pub use checkout::{
    AvailableMethods, CheckoutOrchestrator, CheckoutSession, CheckoutState, PaymentSubmission,
    SubmissionOutcome,
};

// Ledger exports
pub use ledger::TransactionLedger;
pub use transaction::{
    NewTransaction, PaymentMethod, PaymentTransaction, TransactionFilter, TransactionStatus,
};

// In-memory backends
pub use memory::{InMemoryBillingStore, InMemoryProofStorage, StoredProof};

// Payment exports
pub use payment::{
    GatewayCharge, GatewayDecision, ManualInstructions, OutcomeHint, PaymentAdapter,
    PaymentGateway, PaymentRequest, PaymentResult, PaymentSettings, SimulatedGateway,
};

// Plan and tenant exports
pub use plans::{BillingCycle, PlanCatalog, SubscriptionPlan};
pub use tenant::{Tenant, TenantStatus};

// Proof exports
pub use proof::{ALLOWED_PROOF_TYPES, ProofReference, ProofStorage, ProofUpload};

// Review exports
pub use review::AdminReviewQueue;

// Service exports
pub use service::{BillingService, BillingServiceBuilder};

// Storage exports
pub use storage::{BillingStore, CommitOutcome, LedgerCommit, TransactionWrite};

// Subscription exports
pub use subscription::{SubscriptionChange, SubscriptionUpdater};

// Validation exports
pub use validation::{validate_plan_id, validate_tenant_id};
