use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;

use crate::billing::{
    BillingService, PaymentTransaction, TransactionFilter, TransactionStatus, validate_tenant_id,
};
use crate::error::{BillingError, Result};

pub(super) fn routes() -> Router<BillingService> {
    Router::new()
        .route("/transactions", get(list))
        .route("/transactions/pending", get(pending))
        .route("/transactions/flagged", get(flagged))
        .route("/transactions/:id/approve", post(approve))
        .route("/transactions/:id/reject", post(reject))
}

#[derive(Debug, Default, Deserialize)]
struct TransactionQuery {
    status: Option<String>,
    tenant_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RejectRequest {
    note: Option<String>,
}

async fn list(
    State(billing): State<BillingService>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<PaymentTransaction>>> {
    let mut filter = TransactionFilter::new();
    if let Some(status) = query.status.as_deref() {
        let status = TransactionStatus::parse(status)
            .ok_or_else(|| BillingError::validation(format!("unknown transaction status '{}'", status)))?;
        filter = filter.status(status);
    }
    if let Some(tenant_id) = query.tenant_id {
        validate_tenant_id(&tenant_id)?;
        filter = filter.tenant(tenant_id);
    }
    Ok(Json(billing.ledger().list(&filter).await?))
}

async fn pending(State(billing): State<BillingService>) -> Result<Json<Vec<PaymentTransaction>>> {
    Ok(Json(billing.review().pending().await?))
}

async fn flagged(State(billing): State<BillingService>) -> Result<Json<Vec<PaymentTransaction>>> {
    Ok(Json(billing.review().flagged().await?))
}

async fn approve(
    State(billing): State<BillingService>,
    Path(id): Path<String>,
) -> Result<Json<PaymentTransaction>> {
    Ok(Json(billing.review().approve(&id).await?))
}

async fn reject(
    State(billing): State<BillingService>,
    Path(id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> Result<Json<PaymentTransaction>> {
    let note = body.and_then(|Json(request)| request.note);
    Ok(Json(billing.review().reject_with_note(&id, note).await?))
}
