//! JSON HTTP surface over [`BillingService`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenantpay::billing::{BillingService, InMemoryBillingStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let billing = BillingService::builder()
//!     .with_store(Arc::new(InMemoryBillingStore::new()))
//!     .build()?;
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, tenantpay::api::router(billing)).await?;
//! # Ok(())
//! # }
//! ```

mod admin;
mod checkout;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::billing::{
    AvailableMethods, BillingService, PaymentTransaction, SubscriptionPlan, validate_tenant_id,
};
use crate::config::CheckoutConfig;
use crate::error::Result;

/// Every billing route, still waiting for its state.
///
/// The proof upload route accepts bodies up to `max_proof_bytes` plus
/// multipart framing; everything else keeps axum's default limit.
pub fn billing_routes(config: &CheckoutConfig) -> Router<BillingService> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/tenants/:tenant_id/payment-methods", get(payment_methods))
        .route("/tenants/:tenant_id/transactions", get(tenant_transactions))
        .merge(checkout::routes(config.max_proof_bytes))
        .nest("/admin", admin::routes())
}

/// Billing routes bound to a service, ready to serve.
pub fn router(service: BillingService) -> Router {
    billing_routes(service.checkout().config()).with_state(service)
}

async fn list_plans(State(billing): State<BillingService>) -> Result<Json<Vec<SubscriptionPlan>>> {
    Ok(Json(billing.catalog().list().await?))
}

async fn payment_methods(
    State(billing): State<BillingService>,
    Path(tenant_id): Path<String>,
) -> Result<Json<AvailableMethods>> {
    Ok(Json(billing.checkout().available_methods(&tenant_id).await?))
}

async fn tenant_transactions(
    State(billing): State<BillingService>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<PaymentTransaction>>> {
    validate_tenant_id(&tenant_id)?;
    Ok(Json(billing.ledger().history(&tenant_id).await?))
}
