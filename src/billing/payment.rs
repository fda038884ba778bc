//! Payment method dispatch.
//!
//! [`PaymentAdapter`] puts the online rails (Stripe, Flutterwave, Paystack)
//! and manual bank transfers behind one submission contract:
//!
//! - Online: the gateway decides. Approval records a `COMPLETED` row and
//!   upgrades the tenant in the same commit. A decline records `FAILED`
//!   and leaves the tenant alone.
//! - Manual: always records a `PENDING` row carrying the proof reference.
//!   The tenant is only changed once an admin approves it.

use crate::error::{BillingError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::ledger::TransactionLedger;
use super::plans::BillingCycle;
use super::proof::ProofReference;
use super::storage::BillingStore;
use super::transaction::{NewTransaction, PaymentMethod, PaymentTransaction, TransactionStatus};

/// Bank details shown to tenants paying by manual transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualInstructions {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Which payment methods tenants may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettings {
    pub enabled_methods: Vec<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_instructions: Option<ManualInstructions>,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            enabled_methods: PaymentMethod::ALL.to_vec(),
            manual_instructions: None,
        }
    }
}

impl PaymentSettings {
    /// Settings with no method enabled.
    #[must_use]
    pub fn none() -> Self {
        Self {
            enabled_methods: Vec::new(),
            manual_instructions: None,
        }
    }

    #[must_use]
    pub fn enable(mut self, method: PaymentMethod) -> Self {
        if !self.enabled_methods.contains(&method) {
            self.enabled_methods.push(method);
        }
        self
    }

    #[must_use]
    pub fn disable(mut self, method: PaymentMethod) -> Self {
        self.enabled_methods.retain(|m| *m != method);
        self
    }

    #[must_use]
    pub fn with_manual_instructions(mut self, instructions: ManualInstructions) -> Self {
        self.manual_instructions = Some(instructions);
        self
    }

    #[must_use]
    pub fn is_enabled(&self, method: PaymentMethod) -> bool {
        self.enabled_methods.contains(&method)
    }

    /// Fail with `Gateway` if the method is not enabled.
    pub fn ensure_enabled(&self, method: PaymentMethod) -> Result<()> {
        if self.is_enabled(method) {
            Ok(())
        } else {
            Err(BillingError::gateway(format!(
                "payment method {} is not enabled",
                method
            )))
        }
    }
}

/// Simulated result requested by the caller when no real gateway is wired in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeHint {
    #[default]
    Success,
    Failure,
}

/// A charge sent to an online gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCharge {
    pub tenant_id: String,
    pub plan_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub outcome_hint: OutcomeHint,
}

/// The gateway's answer to a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayDecision {
    Approved { reference: String },
    Declined { reason: String },
}

/// Trait for online payment gateways.
///
/// `Err` means the gateway could not be reached or answered garbage; a
/// refused card is an `Ok(GatewayDecision::Declined)`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, charge: &GatewayCharge) -> Result<GatewayDecision>;
}

/// Gateway that follows the caller's outcome hint after an optional delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedGateway {
    latency: Duration,
}

impl SimulatedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, charge: &GatewayCharge) -> Result<GatewayDecision> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(match charge.outcome_hint {
            OutcomeHint::Success => GatewayDecision::Approved {
                reference: format!(
                    "sim_{}_{}",
                    charge.method.as_str().to_ascii_lowercase(),
                    uuid::Uuid::new_v4().simple()
                ),
            },
            OutcomeHint::Failure => GatewayDecision::Declined {
                reason: format!("{} declined the payment", charge.method),
            },
        })
    }
}

/// Everything the adapter needs to process one payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub tenant_id: String,
    pub plan_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub billing_cycle: BillingCycle,
    pub outcome_hint: OutcomeHint,
    pub proof: Option<ProofReference>,
}

/// Outcome of [`PaymentAdapter::process`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentResult {
    pub success: bool,
    pub message: String,
    pub transaction: PaymentTransaction,
}

/// Routes payments to the right rail and records them in the ledger.
#[derive(Clone)]
pub struct PaymentAdapter {
    store: Arc<dyn BillingStore>,
    ledger: TransactionLedger,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentAdapter {
    #[must_use]
    pub fn new(
        store: Arc<dyn BillingStore>,
        ledger: TransactionLedger,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            store,
            ledger,
            gateway,
        }
    }

    /// Process one payment attempt.
    ///
    /// # Errors
    ///
    /// - `Gateway` if the method is disabled or the gateway is unreachable
    ///   (the latter after recording a `FAILED` row).
    /// - `Validation` for a manual payment without proof.
    /// - `Duplicate` if an identical manual payment is already pending.
    pub async fn process(&self, request: PaymentRequest) -> Result<PaymentResult> {
        let settings = self.store.get_payment_settings().await?;
        settings.ensure_enabled(request.method)?;

        if request.method.is_online() {
            self.process_online(request).await
        } else {
            self.process_manual(request).await
        }
    }

    async fn process_manual(&self, request: PaymentRequest) -> Result<PaymentResult> {
        let proof = request
            .proof
            .ok_or_else(|| BillingError::validation("proof of payment required"))?;

        let transaction = self
            .ledger
            .create(NewTransaction {
                tenant_id: request.tenant_id,
                plan_id: request.plan_id,
                billing_cycle: request.billing_cycle,
                amount_cents: request.amount_cents,
                method: PaymentMethod::Manual,
                status: TransactionStatus::Pending,
                proof: Some(proof),
                gateway_reference: None,
            })
            .await?;

        Ok(PaymentResult {
            success: true,
            message: "Payment submitted for review".to_string(),
            transaction,
        })
    }

    async fn process_online(&self, request: PaymentRequest) -> Result<PaymentResult> {
        let charge = GatewayCharge {
            tenant_id: request.tenant_id.clone(),
            plan_id: request.plan_id.clone(),
            method: request.method,
            amount_cents: request.amount_cents,
            outcome_hint: request.outcome_hint,
        };
        let record = |status, gateway_reference| NewTransaction {
            tenant_id: request.tenant_id.clone(),
            plan_id: request.plan_id.clone(),
            billing_cycle: request.billing_cycle,
            amount_cents: request.amount_cents,
            method: request.method,
            status,
            proof: None,
            gateway_reference,
        };

        match self.gateway.charge(&charge).await {
            Ok(GatewayDecision::Approved { reference }) => {
                let transaction = self
                    .ledger
                    .create(record(TransactionStatus::Completed, Some(reference)))
                    .await?;
                Ok(PaymentResult {
                    success: true,
                    message: "Payment successful".to_string(),
                    transaction,
                })
            }
            Ok(GatewayDecision::Declined { reason }) => {
                tracing::warn!(
                    tenant_id = %request.tenant_id,
                    method = %request.method,
                    reason = %reason,
                    "Payment declined"
                );
                let transaction = self
                    .ledger
                    .create(record(TransactionStatus::Failed, None))
                    .await?;
                Ok(PaymentResult {
                    success: false,
                    message: reason,
                    transaction,
                })
            }
            Err(err) => {
                tracing::error!(
                    tenant_id = %request.tenant_id,
                    method = %request.method,
                    error = %err,
                    "Payment gateway unavailable"
                );
                if let Err(record_err) = self.ledger.create(record(TransactionStatus::Failed, None)).await {
                    tracing::error!(
                        tenant_id = %request.tenant_id,
                        error = %record_err,
                        "Failed to record failed payment"
                    );
                }
                Err(match err {
                    BillingError::Gateway(_) => err,
                    other => BillingError::gateway(other.to_string()),
                })
            }
        }
    }
}
