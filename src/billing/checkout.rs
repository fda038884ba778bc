//! Checkout sessions.
//!
//! A checkout is one attempt by one tenant to move to a plan and billing
//! cycle. Each attempt is a [`CheckoutSession`] that walks a small state
//! machine:
//!
//! ```text
//! IDLE ──submit──▶ PROCESSING ──▶ SUCCESS
//!                       │
//!                       ├──────▶ PENDING_MANUAL
//!                       └──────▶ ERROR
//! ```
//!
//! `SUCCESS`, `PENDING_MANUAL` and `ERROR` are terminal. Abandoned sessions
//! need no ledger cleanup since nothing is written before submission.

use crate::config::CheckoutConfig;
use crate::error::{BillingError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::audit::{BillingAuditEvent, BillingAuditLogger};
use super::payment::{
    ManualInstructions, OutcomeHint, PaymentAdapter, PaymentRequest, PaymentResult,
};
use super::plans::{BillingCycle, SubscriptionPlan};
use super::proof::{ProofReference, ProofStorage, ProofUpload};
use super::storage::BillingStore;
use super::transaction::{PaymentMethod, TransactionFilter};
use super::validation::{validate_plan_id, validate_tenant_id};

/// Where a checkout attempt is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutState {
    Idle,
    Processing,
    Success,
    Error,
    PendingManual,
}

impl CheckoutState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::PendingManual)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::PendingManual => "PENDING_MANUAL",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One subscription-change attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub tenant_id: String,
    /// Plan as it was priced when the checkout started.
    pub plan: SubscriptionPlan,
    pub billing_cycle: BillingCycle,
    pub amount_cents: i64,
    pub state: CheckoutState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// Open a session for `plan` at the price of `billing_cycle`.
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, plan: SubscriptionPlan, billing_cycle: BillingCycle) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            amount_cents: plan.price_for(billing_cycle),
            plan,
            billing_cycle,
            state: CheckoutState::Idle,
            transaction_id: None,
            message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `IDLE → PROCESSING`.
    ///
    /// A session already processing refuses with `Duplicate`; a finished one
    /// refuses with `Validation`.
    pub fn begin_processing(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.move_to(CheckoutState::Processing, None, None);
        Ok(())
    }

    /// Fails the same way [`begin_processing`](Self::begin_processing) would
    /// if the session is not `IDLE`.
    pub fn ensure_idle(&self) -> Result<()> {
        match self.state {
            CheckoutState::Idle => Ok(()),
            CheckoutState::Processing => Err(BillingError::duplicate(format!(
                "checkout {} is already processing a payment",
                self.id
            ))),
            finished => Err(BillingError::validation(format!(
                "checkout {} already finished with {}; start a new checkout",
                self.id, finished
            ))),
        }
    }

    /// `PROCESSING → SUCCESS`.
    pub fn succeed(&mut self, transaction_id: impl Into<String>, message: impl Into<String>) -> Result<()> {
        self.finish(CheckoutState::Success, Some(transaction_id.into()), message.into())
    }

    /// `PROCESSING → PENDING_MANUAL`.
    pub fn await_manual_review(
        &mut self,
        transaction_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.finish(CheckoutState::PendingManual, Some(transaction_id.into()), message.into())
    }

    /// `PROCESSING → ERROR`, optionally pointing at the `FAILED` row.
    pub fn fail(&mut self, transaction_id: Option<String>, message: impl Into<String>) -> Result<()> {
        self.finish(CheckoutState::Error, transaction_id, message.into())
    }

    fn finish(
        &mut self,
        state: CheckoutState,
        transaction_id: Option<String>,
        message: String,
    ) -> Result<()> {
        if self.state != CheckoutState::Processing {
            return Err(BillingError::validation(format!(
                "checkout {} cannot move from {} to {}",
                self.id, self.state, state
            )));
        }
        self.move_to(state, transaction_id, Some(message));
        Ok(())
    }

    fn move_to(&mut self, state: CheckoutState, transaction_id: Option<String>, message: Option<String>) {
        self.state = state;
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
        self.message = message;
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// What a tenant submits to pay for a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSubmission {
    pub method: PaymentMethod,
    #[serde(default)]
    pub proof: Option<ProofReference>,
    /// Lets callers steer the simulated gateway. Ignored for manual payments.
    #[serde(default)]
    pub outcome_hint: OutcomeHint,
}

impl PaymentSubmission {
    #[must_use]
    pub fn online(method: PaymentMethod) -> Self {
        Self {
            method,
            proof: None,
            outcome_hint: OutcomeHint::Success,
        }
    }

    #[must_use]
    pub fn manual(proof: Option<ProofReference>) -> Self {
        Self {
            method: PaymentMethod::Manual,
            proof,
            outcome_hint: OutcomeHint::Success,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: OutcomeHint) -> Self {
        self.outcome_hint = hint;
        self
    }
}

/// Result of a submission: the session in its final state and the
/// adapter's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub session: CheckoutSession,
    #[serde(flatten)]
    pub result: PaymentResult,
}

/// Payment methods a tenant can choose from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableMethods {
    pub methods: Vec<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_instructions: Option<ManualInstructions>,
}

/// Moves a session left in `PROCESSING` to `ERROR` when a submission is
/// dropped before it settles, e.g. on client disconnect.
struct ProcessingGuard {
    sessions: Arc<DashMap<String, CheckoutSession>>,
    session_id: String,
    armed: bool,
}

impl ProcessingGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(mut entry) = self.sessions.get_mut(&self.session_id) else {
            return;
        };
        if entry.state != CheckoutState::Processing {
            return;
        }
        let message = "payment submission was interrupted; check transaction history before retrying";
        if entry.fail(None, message).is_ok() {
            tracing::warn!(session_id = %self.session_id, "Checkout submission interrupted");
        }
    }
}

/// Coordinates checkout sessions from start to submission.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    sessions: Arc<DashMap<String, CheckoutSession>>,
    store: Arc<dyn BillingStore>,
    adapter: PaymentAdapter,
    proofs: Arc<dyn ProofStorage>,
    audit: Arc<dyn BillingAuditLogger>,
    config: CheckoutConfig,
}

impl CheckoutOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn BillingStore>,
        adapter: PaymentAdapter,
        proofs: Arc<dyn ProofStorage>,
        audit: Arc<dyn BillingAuditLogger>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            store,
            adapter,
            proofs,
            audit,
            config,
        }
    }

    /// Open a checkout for a tenant moving to `plan_id` on `billing_cycle`.
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed ids or when the tenant is already on the plan.
    /// - `NotFound` if the tenant or plan does not exist.
    pub async fn start_checkout(
        &self,
        tenant_id: &str,
        plan_id: &str,
        billing_cycle: BillingCycle,
    ) -> Result<CheckoutSession> {
        validate_tenant_id(tenant_id)?;
        validate_plan_id(plan_id)?;

        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| BillingError::not_found("tenant", tenant_id))?;
        let plan = self
            .store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| BillingError::not_found("plan", plan_id))?;

        if plan.id == tenant.plan_id {
            return Err(BillingError::validation(format!(
                "tenant {} is already subscribed to plan {}",
                tenant.id, plan.id
            )));
        }

        let session = CheckoutSession::new(tenant.id, plan, billing_cycle);
        self.sessions.insert(session.id.clone(), session.clone());

        tracing::info!(
            session_id = %session.id,
            tenant_id = %session.tenant_id,
            plan_id = %session.plan.id,
            billing_cycle = %session.billing_cycle,
            amount_cents = session.amount_cents,
            "Checkout started"
        );
        self.audit
            .log(BillingAuditEvent::CheckoutStarted {
                session_id: session.id.clone(),
                tenant_id: session.tenant_id.clone(),
                plan_id: session.plan.id.clone(),
                billing_cycle: session.billing_cycle,
                amount_cents: session.amount_cents,
            })
            .await;

        Ok(session)
    }

    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Current snapshot of a session.
    pub fn session(&self, session_id: &str) -> Result<CheckoutSession> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BillingError::not_found("checkout session", session_id))
    }

    /// Drop a session. Nothing is written to the ledger.
    pub async fn abandon(&self, session_id: &str) -> Result<CheckoutSession> {
        let (_, session) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| BillingError::not_found("checkout session", session_id))?;

        tracing::debug!(session_id = %session.id, state = %session.state, "Checkout abandoned");
        self.audit
            .log(BillingAuditEvent::CheckoutAbandoned {
                session_id: session.id.clone(),
                tenant_id: session.tenant_id.clone(),
            })
            .await;
        Ok(session)
    }

    /// Drop sessions idle for longer than the configured TTL.
    ///
    /// Sessions mid-submission are kept. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(self.config.session_ttl()) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, session| {
            session.state == CheckoutState::Processing || session.updated_at > cutoff
        });
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            tracing::debug!(purged, "Purged expired checkout sessions");
        }
        purged
    }

    /// Number of live sessions.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Payment methods a tenant may use, with manual transfer details.
    pub async fn available_methods(&self, tenant_id: &str) -> Result<AvailableMethods> {
        validate_tenant_id(tenant_id)?;
        if self.store.get_tenant(tenant_id).await?.is_none() {
            return Err(BillingError::not_found("tenant", tenant_id));
        }

        let settings = self.store.get_payment_settings().await?;
        let methods: Vec<PaymentMethod> = PaymentMethod::ALL
            .into_iter()
            .filter(|method| settings.is_enabled(*method))
            .collect();
        let manual_instructions = if methods.contains(&PaymentMethod::Manual) {
            settings.manual_instructions
        } else {
            None
        };

        Ok(AvailableMethods {
            methods,
            manual_instructions,
        })
    }

    /// Store a proof-of-payment file for a session that has not been
    /// submitted yet.
    pub async fn upload_proof(&self, session_id: &str, upload: ProofUpload) -> Result<ProofReference> {
        let session = self.session(session_id)?;
        if session.state != CheckoutState::Idle {
            return Err(BillingError::validation(format!(
                "checkout {} no longer accepts proof uploads ({})",
                session.id, session.state
            )));
        }
        upload.validate(self.config.max_proof_bytes)?;

        let size = upload.data.len();
        let reference = self.proofs.store_proof(&session.tenant_id, upload).await?;

        tracing::info!(
            session_id = %session.id,
            tenant_id = %session.tenant_id,
            reference = %reference,
            size,
            "Proof of payment uploaded"
        );
        self.audit
            .log(BillingAuditEvent::ProofUploaded {
                tenant_id: session.tenant_id.clone(),
                reference: reference.to_string(),
            })
            .await;

        Ok(reference)
    }

    /// Submit payment for a session.
    ///
    /// Input problems (missing proof, disabled method) are reported while
    /// the session stays `IDLE` so the caller can correct and resubmit.
    /// Once the session enters `PROCESSING` it always ends in a terminal
    /// state, and any error from the adapter leaves it in `ERROR`. That
    /// holds even if the returned future is dropped mid-flight.
    pub async fn submit_payment(
        &self,
        session_id: &str,
        submission: PaymentSubmission,
    ) -> Result<SubmissionOutcome> {
        let snapshot = self.session(session_id)?;
        snapshot.ensure_idle()?;

        let proof = self.check_submission(&snapshot, &submission).await?;

        let session = {
            let mut entry = self
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| BillingError::not_found("checkout session", session_id))?;
            entry.begin_processing()?;
            entry.value().clone()
        };
        let guard = ProcessingGuard {
            sessions: self.sessions.clone(),
            session_id: session.id.clone(),
            armed: true,
        };
        tracing::debug!(
            session_id = %session.id,
            method = %submission.method,
            "Checkout processing"
        );

        let request = PaymentRequest {
            tenant_id: session.tenant_id.clone(),
            plan_id: session.plan.id.clone(),
            method: submission.method,
            amount_cents: session.amount_cents,
            billing_cycle: session.billing_cycle,
            outcome_hint: submission.outcome_hint,
            proof,
        };

        match self.adapter.process(request).await {
            Ok(result) => {
                guard.disarm();
                let transaction_id = result.transaction.id.clone();
                let message = result.message.clone();
                let session = self.settle_session(session, |s| {
                    if !result.success {
                        s.fail(Some(transaction_id), message)
                    } else if submission.method.is_online() {
                        s.succeed(transaction_id, message)
                    } else {
                        s.await_manual_review(transaction_id, message)
                    }
                })?;
                Ok(SubmissionOutcome { session, result })
            }
            Err(err) => {
                guard.disarm();
                tracing::warn!(
                    session_id = %session.id,
                    tenant_id = %session.tenant_id,
                    error = %err,
                    "Checkout submission failed"
                );
                let flagged = match &err {
                    BillingError::NotFound { entity: "tenant", .. } => {
                        self.flagged_row_for(&session).await
                    }
                    _ => None,
                };
                let message = err.to_string();
                self.settle_session(session, |s| s.fail(flagged, message))?;
                Err(err)
            }
        }
    }

    /// Newest reconciliation-flagged row matching a session, left behind
    /// when the tenant vanished between payment and plan change.
    async fn flagged_row_for(&self, session: &CheckoutSession) -> Option<String> {
        let filter = TransactionFilter::new().tenant(&session.tenant_id).flagged();
        match self.store.list_transactions(&filter).await {
            Ok(rows) => rows
                .into_iter()
                .find(|tx| {
                    tx.plan_id == session.plan.id
                        && tx.amount_cents == session.amount_cents
                        && tx.created_at >= session.updated_at
                })
                .map(|tx| tx.id),
            Err(err) => {
                tracing::error!(
                    session_id = %session.id,
                    error = %err,
                    "Failed to look up flagged transaction"
                );
                None
            }
        }
    }

    async fn check_submission(
        &self,
        session: &CheckoutSession,
        submission: &PaymentSubmission,
    ) -> Result<Option<ProofReference>> {
        let proof = if submission.method.is_online() {
            None
        } else {
            let proof = submission
                .proof
                .clone()
                .ok_or_else(|| BillingError::validation("proof of payment required"))?;
            if !self.proofs.exists(&proof, &session.tenant_id).await? {
                tracing::warn!(
                    session_id = %session.id,
                    tenant_id = %session.tenant_id,
                    reference = %proof,
                    "Submission refused: proof not found for tenant"
                );
                return Err(BillingError::validation(format!(
                    "unknown proof of payment reference: {}",
                    proof
                )));
            }
            Some(proof)
        };

        let settings = self.store.get_payment_settings().await?;
        settings.ensure_enabled(submission.method).inspect_err(|_| {
            tracing::debug!(
                session_id = %session.id,
                method = %submission.method,
                "Submission refused: method disabled"
            );
        })?;

        Ok(proof)
    }

    /// Apply a terminal transition to the live session, or to the snapshot
    /// if the session was abandoned while processing.
    fn settle_session(
        &self,
        mut snapshot: CheckoutSession,
        transition: impl FnOnce(&mut CheckoutSession) -> Result<()>,
    ) -> Result<CheckoutSession> {
        match self.sessions.get_mut(&snapshot.id) {
            Some(mut entry) => {
                transition(entry.value_mut())?;
                Ok(entry.value().clone())
            }
            None => {
                tracing::debug!(session_id = %snapshot.id, "Checkout abandoned during processing");
                transition(&mut snapshot)?;
                Ok(snapshot)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::audit::RecordingAuditLogger;
    use crate::billing::ledger::TransactionLedger;
    use crate::billing::memory::{InMemoryBillingStore, InMemoryProofStorage};
    use crate::billing::payment::{PaymentSettings, SimulatedGateway};
    use crate::billing::subscription::SubscriptionUpdater;
    use crate::billing::tenant::{Tenant, TenantStatus};
    use crate::billing::transaction::TransactionStatus;
    use std::time::Duration;

    struct Fixture {
        store: InMemoryBillingStore,
        proofs: InMemoryProofStorage,
        audit: Arc<RecordingAuditLogger>,
        checkout: CheckoutOrchestrator,
    }

    fn fixture(config: CheckoutConfig) -> Fixture {
        let store = InMemoryBillingStore::new();
        store.seed_plans([
            SubscriptionPlan::new("basic", "Basic").prices(1_900, 19_000),
            SubscriptionPlan::new("pro", "Pro").prices(4_900, 49_000),
        ]);
        store.seed_tenant(Tenant::new("t1", "basic"));
        store.seed_tenant(Tenant::new("t2", "basic"));

        let shared: Arc<dyn BillingStore> = Arc::new(store.clone());
        let proofs = InMemoryProofStorage::new();
        let audit = Arc::new(RecordingAuditLogger::new());
        let updater = SubscriptionUpdater::new(shared.clone(), audit.clone());
        let ledger = TransactionLedger::new(shared.clone(), updater, audit.clone(), config.duplicate_window());
        let gateway = SimulatedGateway::new().with_latency(config.gateway_latency());
        let adapter = PaymentAdapter::new(shared.clone(), ledger, Arc::new(gateway));
        let checkout = CheckoutOrchestrator::new(
            shared,
            adapter,
            Arc::new(proofs.clone()),
            audit.clone(),
            config,
        );

        Fixture {
            store,
            proofs,
            audit,
            checkout,
        }
    }

    fn receipt() -> ProofUpload {
        ProofUpload::new("receipt.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47])
    }

    #[test]
    fn test_state_machine_happy_paths() {
        let plan = SubscriptionPlan::new("pro", "Pro").prices(4_900, 49_000);
        let mut session = CheckoutSession::new("t1", plan, BillingCycle::Yearly);
        assert_eq!(session.amount_cents, 49_000);
        assert_eq!(session.state, CheckoutState::Idle);

        session.begin_processing().unwrap();
        assert_eq!(session.state, CheckoutState::Processing);
        session.await_manual_review("tx_1", "Payment submitted for review").unwrap();
        assert_eq!(session.state, CheckoutState::PendingManual);
        assert_eq!(session.transaction_id.as_deref(), Some("tx_1"));
        assert!(session.is_terminal());
    }

    #[test]
    fn test_state_machine_refusals() {
        let plan = SubscriptionPlan::new("pro", "Pro").prices(4_900, 49_000);
        let mut session = CheckoutSession::new("t1", plan, BillingCycle::Monthly);

        // Cannot finish without processing.
        assert!(session.succeed("tx_1", "ok").is_err());

        session.begin_processing().unwrap();
        assert!(matches!(session.begin_processing(), Err(BillingError::Duplicate(_))));

        session.fail(None, "gateway down").unwrap();
        assert!(matches!(session.begin_processing(), Err(BillingError::Validation(_))));
        assert!(session.fail(None, "again").is_err());
        assert_eq!(session.message.as_deref(), Some("gateway down"));
    }

    #[test]
    fn test_state_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&CheckoutState::PendingManual).unwrap(),
            "\"PENDING_MANUAL\""
        );
    }

    #[tokio::test]
    async fn test_start_checkout_prices_by_cycle() {
        let f = fixture(CheckoutConfig::default());

        let monthly = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();
        let yearly = f.checkout.start_checkout("t1", "pro", BillingCycle::Yearly).await.unwrap();
        assert_eq!(monthly.amount_cents, 4_900);
        assert_eq!(yearly.amount_cents, 49_000);
        assert_eq!(f.checkout.active_sessions(), 2);
        assert_eq!(f.audit.kinds().await, vec!["checkout_started", "checkout_started"]);
    }

    #[tokio::test]
    async fn test_start_checkout_rejections() {
        let f = fixture(CheckoutConfig::default());

        let same = f.checkout.start_checkout("t1", "basic", BillingCycle::Yearly).await;
        assert!(matches!(same, Err(BillingError::Validation(_))));

        let ghost = f.checkout.start_checkout("ghost", "pro", BillingCycle::Monthly).await;
        assert!(matches!(ghost, Err(BillingError::NotFound { entity: "tenant", .. })));

        let plan = f.checkout.start_checkout("t1", "enterprise", BillingCycle::Monthly).await;
        assert!(matches!(plan, Err(BillingError::NotFound { entity: "plan", .. })));

        let bad = f.checkout.start_checkout("t1;drop", "pro", BillingCycle::Monthly).await;
        assert!(matches!(bad, Err(BillingError::Validation(_))));

        assert!(f.store.transactions().is_empty());
        assert_eq!(f.checkout.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_online_success() {
        let f = fixture(CheckoutConfig::default());
        let session = f.checkout.start_checkout("t1", "pro", BillingCycle::Yearly).await.unwrap();

        let outcome = f
            .checkout
            .submit_payment(&session.id, PaymentSubmission::online(PaymentMethod::Stripe))
            .await
            .unwrap();
        assert!(outcome.result.success);
        assert_eq!(outcome.session.state, CheckoutState::Success);
        assert_eq!(outcome.result.transaction.status, TransactionStatus::Completed);
        assert_eq!(outcome.result.transaction.amount_cents, 49_000);

        let tenant = f.store.tenant("t1").unwrap();
        assert_eq!(tenant.plan_id, "pro");
        assert_eq!(tenant.status, TenantStatus::Active);
        assert_eq!(f.checkout.session(&session.id).unwrap().state, CheckoutState::Success);
    }

    #[tokio::test]
    async fn test_online_decline_ends_in_error() {
        let f = fixture(CheckoutConfig::default());
        let session = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();

        let outcome = f
            .checkout
            .submit_payment(
                &session.id,
                PaymentSubmission::online(PaymentMethod::Paystack).with_hint(OutcomeHint::Failure),
            )
            .await
            .unwrap();
        assert!(!outcome.result.success);
        assert_eq!(outcome.session.state, CheckoutState::Error);
        assert_eq!(outcome.result.transaction.status, TransactionStatus::Failed);
        assert_eq!(f.store.tenant("t1").unwrap().plan_id, "basic");

        // ERROR is terminal.
        let retry = f
            .checkout
            .submit_payment(&session.id, PaymentSubmission::online(PaymentMethod::Stripe))
            .await;
        assert!(matches!(retry, Err(BillingError::Validation(_))));
        assert_eq!(f.store.transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_without_proof_stays_idle() {
        let f = fixture(CheckoutConfig::default());
        let session = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();

        let err = f
            .checkout
            .submit_payment(&session.id, PaymentSubmission::manual(None))
            .await
            .unwrap_err();
        assert_eq!(err, BillingError::validation("proof of payment required"));
        assert_eq!(f.checkout.session(&session.id).unwrap().state, CheckoutState::Idle);
        assert!(f.store.transactions().is_empty());

        // Correct and resubmit on the same session.
        let proof = f.checkout.upload_proof(&session.id, receipt()).await.unwrap();
        let outcome = f
            .checkout
            .submit_payment(&session.id, PaymentSubmission::manual(Some(proof.clone())))
            .await
            .unwrap();
        assert_eq!(outcome.session.state, CheckoutState::PendingManual);
        assert_eq!(outcome.result.transaction.status, TransactionStatus::Pending);
        assert_eq!(outcome.result.transaction.proof, Some(proof));
        assert_eq!(f.store.tenant("t1").unwrap().plan_id, "basic");
    }

    #[tokio::test]
    async fn test_manual_with_unknown_proof() {
        let f = fixture(CheckoutConfig::default());
        let session = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();
        let forged = ProofReference::new("memory://proofs/t1/forged.png").unwrap();

        let err = f
            .checkout
            .submit_payment(&session.id, PaymentSubmission::manual(Some(forged)))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
        assert!(f.store.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_manual_with_another_tenants_proof() {
        let f = fixture(CheckoutConfig::default());
        let theirs = f.checkout.start_checkout("t2", "pro", BillingCycle::Monthly).await.unwrap();
        let proof = f.checkout.upload_proof(&theirs.id, receipt()).await.unwrap();

        let ours = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();
        let err = f
            .checkout
            .submit_payment(&ours.id, PaymentSubmission::manual(Some(proof.clone())))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
        assert_eq!(f.checkout.session(&ours.id).unwrap().state, CheckoutState::Idle);
        assert!(f.store.transactions().is_empty());

        // The owner can still use it.
        let outcome = f
            .checkout
            .submit_payment(&theirs.id, PaymentSubmission::manual(Some(proof)))
            .await
            .unwrap();
        assert_eq!(outcome.result.transaction.tenant_id, "t2");
    }

    #[tokio::test]
    async fn test_interrupted_submission_ends_in_error() {
        let f = fixture(CheckoutConfig {
            gateway_latency_ms: 200,
            ..CheckoutConfig::default()
        });
        let session = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();

        let handle = {
            let checkout = f.checkout.clone();
            let session_id = session.id.clone();
            tokio::spawn(async move {
                checkout
                    .submit_payment(&session_id, PaymentSubmission::online(PaymentMethod::Stripe))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.checkout.session(&session.id).unwrap().state, CheckoutState::Processing);

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        let interrupted = f.checkout.session(&session.id).unwrap();
        assert_eq!(interrupted.state, CheckoutState::Error);
        assert!(interrupted.transaction_id.is_none());
        assert!(f.store.transactions().is_empty());
        assert_eq!(f.store.tenant("t1").unwrap().plan_id, "basic");

        let retry = f
            .checkout
            .submit_payment(&session.id, PaymentSubmission::online(PaymentMethod::Stripe))
            .await;
        assert!(matches!(retry, Err(BillingError::Validation(_))));

        // A fresh checkout goes through.
        let again = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();
        let outcome = f
            .checkout
            .submit_payment(&again.id, PaymentSubmission::online(PaymentMethod::Stripe))
            .await
            .unwrap();
        assert_eq!(outcome.session.state, CheckoutState::Success);
    }

    #[tokio::test]
    async fn test_vanished_tenant_session_points_at_flagged_row() {
        let f = fixture(CheckoutConfig::default());
        let session = f.checkout.start_checkout("t1", "pro", BillingCycle::Yearly).await.unwrap();
        f.store.remove_tenant("t1");

        let err = f
            .checkout
            .submit_payment(&session.id, PaymentSubmission::online(PaymentMethod::Stripe))
            .await
            .unwrap_err();
        assert_eq!(err, BillingError::not_found("tenant", "t1"));

        let rows = f.store.transactions();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, TransactionStatus::Completed);
        assert!(rows[0].needs_reconciliation);

        let settled = f.checkout.session(&session.id).unwrap();
        assert_eq!(settled.state, CheckoutState::Error);
        assert_eq!(settled.transaction_id.as_deref(), Some(rows[0].id.as_str()));
    }

    #[tokio::test]
    async fn test_disabled_method_is_gateway_error() {
        let f = fixture(CheckoutConfig::default());
        f.store
            .seed_payment_settings(PaymentSettings::default().disable(PaymentMethod::Flutterwave));
        let session = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();

        let err = f
            .checkout
            .submit_payment(&session.id, PaymentSubmission::online(PaymentMethod::Flutterwave))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Gateway(_)));
        assert_eq!(f.checkout.session(&session.id).unwrap().state, CheckoutState::Idle);

        let methods = f.checkout.available_methods("t1").await.unwrap();
        assert!(!methods.methods.contains(&PaymentMethod::Flutterwave));
        assert!(methods.methods.contains(&PaymentMethod::Manual));
    }

    #[tokio::test]
    async fn test_duplicate_manual_submission_across_sessions() {
        let f = fixture(CheckoutConfig::default());

        let first = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();
        let proof = f.checkout.upload_proof(&first.id, receipt()).await.unwrap();
        f.checkout
            .submit_payment(&first.id, PaymentSubmission::manual(Some(proof.clone())))
            .await
            .unwrap();

        let second = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();
        let err = f
            .checkout
            .submit_payment(&second.id, PaymentSubmission::manual(Some(proof)))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Duplicate(_)));
        assert_eq!(f.checkout.session(&second.id).unwrap().state, CheckoutState::Error);
        assert_eq!(f.store.transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_proof_limits() {
        let f = fixture(CheckoutConfig {
            max_proof_bytes: 8,
            ..CheckoutConfig::default()
        });
        let session = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();

        let too_big = ProofUpload::new("big.pdf", "application/pdf", vec![0u8; 9]);
        assert!(f.checkout.upload_proof(&session.id, too_big).await.is_err());

        let wrong_type = ProofUpload::new("notes.txt", "text/plain", vec![1u8; 4]);
        assert!(f.checkout.upload_proof(&session.id, wrong_type).await.is_err());

        f.checkout.upload_proof(&session.id, receipt()).await.unwrap();
        assert_eq!(f.proofs.len(), 1);

        let missing = f.checkout.upload_proof("nope", receipt()).await;
        assert!(matches!(missing, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_abandon_and_purge() {
        let f = fixture(CheckoutConfig::default());
        let session = f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();

        let abandoned = f.checkout.abandon(&session.id).await.unwrap();
        assert_eq!(abandoned.id, session.id);
        assert!(f.checkout.session(&session.id).is_err());
        assert!(f.checkout.abandon(&session.id).await.is_err());
        assert!(f.store.transactions().is_empty());
        assert!(f.audit.kinds().await.contains(&"checkout_abandoned"));

        f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();
        assert_eq!(f.checkout.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_purge_drops_stale_sessions() {
        let f = fixture(CheckoutConfig {
            session_ttl_secs: 1,
            ..CheckoutConfig::default()
        });
        f.checkout.start_checkout("t1", "pro", BillingCycle::Monthly).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(f.checkout.purge_expired(), 1);
        assert_eq!(f.checkout.active_sessions(), 0);
    }
}
