//! Audit logging for billing operations.
//!
//! Provides a trait-based audit logging system for tracking billing events.
//! Every ledger write, review decision and subscription change is emitted
//! here, which also makes reconciliation mismatches visible to operators.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::plans::BillingCycle;
use super::transaction::{PaymentMethod, TransactionStatus};

/// Audit event types for billing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingAuditEvent {
    /// Checkout session opened.
    CheckoutStarted {
        session_id: String,
        tenant_id: String,
        plan_id: String,
        billing_cycle: BillingCycle,
        amount_cents: i64,
    },
    /// Checkout session dropped before submission.
    CheckoutAbandoned {
        session_id: String,
        tenant_id: String,
    },
    /// Proof-of-payment file stored.
    ProofUploaded {
        tenant_id: String,
        reference: String,
    },
    /// Ledger row created.
    TransactionRecorded {
        transaction_id: String,
        tenant_id: String,
        plan_id: String,
        method: PaymentMethod,
        status: TransactionStatus,
        amount_cents: i64,
    },
    /// Pending manual payment approved.
    TransactionApproved {
        transaction_id: String,
        tenant_id: String,
    },
    /// Pending manual payment rejected.
    TransactionRejected {
        transaction_id: String,
        tenant_id: String,
        note: Option<String>,
    },
    /// Tenant moved to a paid plan.
    SubscriptionApplied {
        tenant_id: String,
        plan_id: String,
        billing_cycle: BillingCycle,
    },
    /// A settled payment could not be applied to its tenant.
    SubscriptionMismatch {
        tenant_id: String,
        plan_id: String,
        transaction_id: Option<String>,
    },
}

impl fmt::Display for BillingAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckoutStarted {
                session_id,
                tenant_id,
                plan_id,
                billing_cycle,
                amount_cents,
            } => write!(
                f,
                "Checkout started: session={session_id}, tenant={tenant_id}, plan={plan_id}, \
                 cycle={billing_cycle}, amount={amount_cents}"
            ),
            Self::CheckoutAbandoned {
                session_id,
                tenant_id,
            } => write!(
                f,
                "Checkout abandoned: session={session_id}, tenant={tenant_id}"
            ),
            Self::ProofUploaded {
                tenant_id,
                reference,
            } => write!(f, "Proof uploaded: tenant={tenant_id}, reference={reference}"),
            Self::TransactionRecorded {
                transaction_id,
                tenant_id,
                plan_id,
                method,
                status,
                amount_cents,
            } => write!(
                f,
                "Transaction recorded: tx={transaction_id}, tenant={tenant_id}, plan={plan_id}, \
                 method={method}, status={status}, amount={amount_cents}"
            ),
            Self::TransactionApproved {
                transaction_id,
                tenant_id,
            } => write!(
                f,
                "Transaction approved: tx={transaction_id}, tenant={tenant_id}"
            ),
            Self::TransactionRejected {
                transaction_id,
                tenant_id,
                note,
            } => write!(
                f,
                "Transaction rejected: tx={transaction_id}, tenant={tenant_id}, note={}",
                note.as_deref().unwrap_or("-")
            ),
            Self::SubscriptionApplied {
                tenant_id,
                plan_id,
                billing_cycle,
            } => write!(
                f,
                "Subscription applied: tenant={tenant_id}, plan={plan_id}, cycle={billing_cycle}"
            ),
            Self::SubscriptionMismatch {
                tenant_id,
                plan_id,
                transaction_id,
            } => write!(
                f,
                "Subscription mismatch: tenant={tenant_id}, plan={plan_id}, tx={}",
                transaction_id.as_deref().unwrap_or("-")
            ),
        }
    }
}

impl BillingAuditEvent {
    /// The event kind as a string for structured logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CheckoutStarted { .. } => "checkout_started",
            Self::CheckoutAbandoned { .. } => "checkout_abandoned",
            Self::ProofUploaded { .. } => "proof_uploaded",
            Self::TransactionRecorded { .. } => "transaction_recorded",
            Self::TransactionApproved { .. } => "transaction_approved",
            Self::TransactionRejected { .. } => "transaction_rejected",
            Self::SubscriptionApplied { .. } => "subscription_applied",
            Self::SubscriptionMismatch { .. } => "subscription_mismatch",
        }
    }
}

/// Trait for audit logging backends.
///
/// Implementations should handle their own failures (e.g. log to stderr)
/// rather than disrupt billing operations.
#[async_trait]
pub trait BillingAuditLogger: Send + Sync {
    /// Log a billing audit event.
    async fn log(&self, event: BillingAuditEvent);
}

/// No-op audit logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

#[async_trait]
impl BillingAuditLogger for NoOpAuditLogger {
    async fn log(&self, _event: BillingAuditEvent) {}
}

/// Tracing-based audit logger.
///
/// Logs events at INFO level under the `tenantpay::audit` target.
/// Reconciliation mismatches are logged at ERROR.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

#[async_trait]
impl BillingAuditLogger for TracingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        if matches!(event, BillingAuditEvent::SubscriptionMismatch { .. }) {
            tracing::error!(
                target: "tenantpay::audit",
                event_type = %event.kind(),
                "{}", event
            );
        } else {
            tracing::info!(
                target: "tenantpay::audit",
                event_type = %event.kind(),
                "{}", event
            );
        }
    }
}

/// Audit logger that keeps events in memory.
///
/// Useful in tests and for surfacing recent activity in an admin view.
#[derive(Debug, Clone, Default)]
pub struct RecordingAuditLogger {
    events: Arc<Mutex<Vec<BillingAuditEvent>>>,
}

impl RecordingAuditLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub async fn events(&self) -> Vec<BillingAuditEvent> {
        self.events.lock().await.clone()
    }

    /// Kinds of the recorded events, in order.
    pub async fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().await.iter().map(BillingAuditEvent::kind).collect()
    }
}

#[async_trait]
impl BillingAuditLogger for RecordingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        self.events.lock().await.push(event);
    }
}
