//! Gateway webhook endpoint.
//!
//! The signature is verified over the raw body before the event is parsed
//! or applied; a bad signature touches no state. Valid events are always
//! acknowledged with 200, including unknown types and no-op matches, so
//! the gateway does not redeliver indefinitely.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use mealpay_core::error::AppError;

use crate::AppState;

pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing webhook signature header");
            AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature"))
        })?;

    let valid = state
        .orchestrator
        .gateway()
        .verify_webhook_signature(&body, signature)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;

    if !valid {
        tracing::warn!("Invalid webhook signature");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let event = state
        .orchestrator
        .gateway()
        .parse_webhook_event(&body)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to parse webhook event");
            AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload"))
        })?;

    tracing::info!(event_type = %event.event, "Processing gateway webhook");

    state.orchestrator.apply_webhook_event(&event).await?;

    Ok(StatusCode::OK)
}
