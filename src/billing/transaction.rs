//! Payment transaction records and their status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plans::BillingCycle;
use super::proof::ProofReference;

/// Payment rail used for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Stripe,
    Flutterwave,
    Paystack,
    /// Out-of-band bank transfer verified from an uploaded proof.
    Manual,
}

impl PaymentMethod {
    /// Every supported method, in display order.
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Stripe,
        PaymentMethod::Flutterwave,
        PaymentMethod::Paystack,
        PaymentMethod::Manual,
    ];

    /// Online rails resolve synchronously through a gateway.
    #[must_use]
    pub fn is_online(&self) -> bool {
        !matches!(self, Self::Manual)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "Stripe",
            Self::Flutterwave => "Flutterwave",
            Self::Paystack => "Paystack",
            Self::Manual => "Manual",
        }
    }

    /// Parse from the wire spelling, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    /// Manual payment awaiting admin review.
    Pending,
    /// Paid; the tenant subscription reflects it.
    Completed,
    /// Online payment declined or errored.
    Failed,
    /// Manual payment refused by an admin.
    Rejected,
}

impl TransactionStatus {
    /// Legal ledger transitions: a pending row is settled exactly once.
    #[must_use]
    pub fn can_transition_to(&self, target: TransactionStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Rejected)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: String,
    pub tenant_id: String,
    /// Plan being purchased. Review matches on this, not on the tenant's live plan.
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: TransactionStatus,
    pub proof: Option<ProofReference>,
    pub gateway_reference: Option<String>,
    pub review_note: Option<String>,
    /// Set when the row completed but the tenant change could not be applied.
    pub needs_reconciliation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Fields supplied by the payment adapter when recording an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub tenant_id: String,
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: TransactionStatus,
    pub proof: Option<ProofReference>,
    pub gateway_reference: Option<String>,
}

impl NewTransaction {
    /// Materialize the row with a fresh id and timestamps.
    #[must_use]
    pub fn into_transaction(self) -> PaymentTransaction {
        let now = Utc::now();
        PaymentTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: self.tenant_id,
            plan_id: self.plan_id,
            billing_cycle: self.billing_cycle,
            amount_cents: self.amount_cents,
            method: self.method,
            status: self.status,
            proof: self.proof,
            gateway_reference: self.gateway_reference,
            review_note: None,
            needs_reconciliation: false,
            created_at: now,
            updated_at: now,
            reviewed_at: None,
        }
    }
}

/// Filter for ledger queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub tenant_id: Option<String>,
    pub method: Option<PaymentMethod>,
    pub needs_reconciliation: Option<bool>,
}

impl TransactionFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn flagged(mut self) -> Self {
        self.needs_reconciliation = Some(true);
        self
    }

    #[must_use]
    pub fn matches(&self, tx: &PaymentTransaction) -> bool {
        self.status.is_none_or(|s| tx.status == s)
            && self.tenant_id.as_deref().is_none_or(|t| tx.tenant_id == t)
            && self.method.is_none_or(|m| tx.method == m)
            && self
                .needs_reconciliation
                .is_none_or(|flag| tx.needs_reconciliation == flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_transitions() {
        use TransactionStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));

        for terminal in [Completed, Failed, Rejected] {
            assert!(terminal.is_terminal());
            for target in [Pending, Completed, Failed, Rejected] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(PaymentMethod::parse("paystack"), Some(PaymentMethod::Paystack));
        assert_eq!(PaymentMethod::parse("Manual"), Some(PaymentMethod::Manual));
        assert_eq!(PaymentMethod::parse("paypal"), None);
        assert!(PaymentMethod::Stripe.is_online());
        assert!(!PaymentMethod::Manual.is_online());
    }

    #[test]
    fn test_filter_matches() {
        let tx = NewTransaction {
            tenant_id: "t1".to_string(),
            plan_id: "pro".to_string(),
            billing_cycle: BillingCycle::Yearly,
            amount_cents: 100,
            method: PaymentMethod::Manual,
            status: TransactionStatus::Pending,
            proof: None,
            gateway_reference: None,
        }
        .into_transaction();

        assert!(TransactionFilter::new().matches(&tx));
        assert!(TransactionFilter::new().status(TransactionStatus::Pending).tenant("t1").matches(&tx));
        assert!(!TransactionFilter::new().tenant("t2").matches(&tx));
        assert!(!TransactionFilter::new().method(PaymentMethod::Stripe).matches(&tx));
        assert!(!TransactionFilter::new().flagged().matches(&tx));
    }
}
