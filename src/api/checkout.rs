use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::billing::{
    BillingCycle, BillingService, CheckoutSession, PaymentSubmission, ProofReference, ProofUpload,
    SubmissionOutcome,
};
use crate::error::{BillingError, Result};

// Room for boundaries and part headers around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub(super) fn routes(max_proof_bytes: usize) -> Router<BillingService> {
    Router::new()
        .route("/checkout", post(start))
        .route("/checkout/:session_id", get(show).delete(abandon))
        .route(
            "/checkout/:session_id/proof",
            post(upload_proof).layer(DefaultBodyLimit::max(
                max_proof_bytes.saturating_add(MULTIPART_OVERHEAD),
            )),
        )
        .route("/checkout/:session_id/submit", post(submit))
}

#[derive(Debug, Deserialize)]
struct StartCheckoutRequest {
    tenant_id: String,
    plan_id: String,
    #[serde(default)]
    billing_cycle: BillingCycle,
}

#[derive(Debug, Serialize)]
struct ProofUploaded {
    proof: ProofReference,
}

async fn start(
    State(billing): State<BillingService>,
    Json(request): Json<StartCheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutSession>)> {
    let session = billing
        .checkout()
        .start_checkout(&request.tenant_id, &request.plan_id, request.billing_cycle)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn show(
    State(billing): State<BillingService>,
    Path(session_id): Path<String>,
) -> Result<Json<CheckoutSession>> {
    Ok(Json(billing.checkout().session(&session_id)?))
}

async fn abandon(
    State(billing): State<BillingService>,
    Path(session_id): Path<String>,
) -> Result<StatusCode> {
    billing.checkout().abandon(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_proof(
    State(billing): State<BillingService>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ProofUploaded>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BillingError::validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("proof").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| BillingError::validation(format!("failed to read proof upload: {}", e)))?;

        let proof = billing
            .checkout()
            .upload_proof(&session_id, ProofUpload::new(file_name, content_type, data))
            .await?;
        return Ok((StatusCode::CREATED, Json(ProofUploaded { proof })));
    }

    Err(BillingError::validation("multipart field 'file' is required"))
}

async fn submit(
    State(billing): State<BillingService>,
    Path(session_id): Path<String>,
    Json(submission): Json<PaymentSubmission>,
) -> Result<Json<SubmissionOutcome>> {
    Ok(Json(billing.checkout().submit_payment(&session_id, submission).await?))
}
