//! Subscription plan catalog.
//!
//! Plans are read-only to the checkout flow. The super-admin console edits
//! them through [`PlanCatalog::upsert`]; edits never reach back into past
//! transactions because each transaction stores its own plan id and amount.

use crate::error::{BillingError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::storage::BillingStore;
use super::validation::{validate_plan_id, validate_plan_name};

/// Billing period selected at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    /// Billed every month at the plan's monthly price.
    #[default]
    Monthly,
    /// Billed once a year at the plan's yearly price.
    Yearly,
}

impl BillingCycle {
    /// Parse from the wire spelling.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" | "month" => Some(Self::Monthly),
            "yearly" | "year" | "annual" => Some(Self::Yearly),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A subscription plan definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    /// Unique plan identifier (e.g., "basic", "pro").
    pub id: String,
    /// Display name.
    pub name: String,
    /// Marketing description.
    pub description: String,
    /// Monthly price in minor units.
    pub price_cents: i64,
    /// Yearly price in minor units.
    pub yearly_price_cents: i64,
    /// Features included in the plan.
    pub features: Vec<String>,
    /// Highlighted as the recommended choice.
    pub recommended: bool,
}

impl SubscriptionPlan {
    /// Create a plan with the given id and name and zero prices.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price_cents: 0,
            yearly_price_cents: 0,
            features: Vec::new(),
            recommended: false,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set monthly and yearly prices in minor units.
    #[must_use]
    pub fn prices(mut self, monthly_cents: i64, yearly_cents: i64) -> Self {
        self.price_cents = monthly_cents;
        self.yearly_price_cents = yearly_cents;
        self
    }

    #[must_use]
    pub fn features<I, F>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn recommended(mut self, recommended: bool) -> Self {
        self.recommended = recommended;
        self
    }

    /// Amount due for one period of the given cycle.
    #[must_use]
    pub fn price_for(&self, cycle: BillingCycle) -> i64 {
        match cycle {
            BillingCycle::Monthly => self.price_cents,
            BillingCycle::Yearly => self.yearly_price_cents,
        }
    }

    /// Check if this plan includes a feature.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Savings of the yearly price over twelve monthly payments, in minor units.
    #[must_use]
    pub fn yearly_savings_cents(&self) -> i64 {
        (self.price_cents * 12 - self.yearly_price_cents).max(0)
    }
}

/// Read access to the plan catalog, plus validated admin edits.
#[derive(Clone)]
pub struct PlanCatalog {
    store: Arc<dyn BillingStore>,
}

impl PlanCatalog {
    #[must_use]
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// All plans, in catalog order.
    pub async fn list(&self) -> Result<Vec<SubscriptionPlan>> {
        self.store.list_plans().await
    }

    /// Look up a plan, failing with `NotFound` if it does not exist.
    pub async fn get(&self, plan_id: &str) -> Result<SubscriptionPlan> {
        self.store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| BillingError::not_found("plan", plan_id))
    }

    /// Create or replace a plan definition.
    pub async fn upsert(&self, plan: SubscriptionPlan) -> Result<SubscriptionPlan> {
        validate_plan_id(&plan.id)?;
        validate_plan_name(&plan.name)?;
        if plan.price_cents < 0 || plan.yearly_price_cents < 0 {
            return Err(BillingError::validation(format!(
                "plan '{}' has a negative price",
                plan.id
            )));
        }

        self.store.save_plan(&plan).await?;
        tracing::info!(plan_id = %plan.id, "Plan saved");
        Ok(plan)
    }
}
