//! Subscription-relevant view of a tenant.
//!
//! Only the fields the billing flow reads or writes live here. The rest of
//! the tenant record belongs to the surrounding application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plans::BillingCycle;

/// Lifecycle status of a tenant account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TenantStatus {
    /// Evaluating the product before the first payment.
    Trial,
    /// Paid up.
    Active,
    /// Access withheld by the platform.
    Suspended,
    /// Signed up but not yet verified.
    Unverified,
}

impl TenantStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "TRIAL",
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Unverified => "UNVERIFIED",
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tenant business account.
///
/// `plan_id`, `billing_cycle` and `status` are written only by
/// [`SubscriptionUpdater`](super::subscription::SubscriptionUpdater).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
    pub status: TenantStatus,
    pub joined_at: DateTime<Utc>,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

impl Tenant {
    /// Create a tenant on a trial of the given plan.
    #[must_use]
    pub fn new(id: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            plan_id: plan_id.into(),
            billing_cycle: BillingCycle::Monthly,
            status: TenantStatus::Trial,
            joined_at: Utc::now(),
            trial_ends_at: None,
        }
    }

    #[must_use]
    pub fn with_cycle(mut self, cycle: BillingCycle) -> Self {
        self.billing_cycle = cycle;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_trial_end(mut self, ends_at: DateTime<Utc>) -> Self {
        self.trial_ends_at = Some(ends_at);
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    /// Whole days left in the trial, if the tenant is trialing and it has not ended.
    #[must_use]
    pub fn trial_days_remaining(&self) -> Option<u32> {
        if self.status != TenantStatus::Trial {
            return None;
        }
        let remaining = self.trial_ends_at? - Utc::now();
        if remaining.num_seconds() > 0 {
            Some(remaining.num_days() as u32)
        } else {
            None
        }
    }
}
