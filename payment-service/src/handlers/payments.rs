//! Payment endpoints: order creation, capture confirmation, refunds.

use axum::{extract::State, http::StatusCode, Json};
use mealpay_core::error::AppError;

use crate::dtos::{
    CapturePaymentRequest, CapturePaymentResponse, CreatePaymentOrderRequest,
    CreatePaymentOrderResponse, CreateRefundRequest, CreateRefundResponse,
};
use crate::middleware::CallerContext;
use crate::AppState;

/// Create a new payment order against a meal order or subscription.
pub async fn create_payment_order(
    State(state): State<AppState>,
    CallerContext(caller): CallerContext,
    Json(payload): Json<CreatePaymentOrderRequest>,
) -> Result<(StatusCode, Json<CreatePaymentOrderResponse>), AppError> {
    tracing::info!(
        caller_id = %caller.user_id,
        role = caller.role.as_str(),
        amount = payload.amount,
        currency = %payload.currency,
        "Creating payment order"
    );

    let response = state
        .orchestrator
        .create_payment_order(payload, &caller)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Confirm a checkout capture (signature-verified).
pub async fn capture_payment(
    State(state): State<AppState>,
    Json(payload): Json<CapturePaymentRequest>,
) -> Result<Json<CapturePaymentResponse>, AppError> {
    tracing::info!(
        gateway_order_id = %payload.gateway_order_id,
        gateway_payment_id = %payload.gateway_payment_id,
        "Capturing payment"
    );

    let response = state.orchestrator.capture_payment(payload).await?;
    Ok(Json(response))
}

/// Initiate a refund against a captured transaction.
pub async fn create_refund(
    State(state): State<AppState>,
    CallerContext(caller): CallerContext,
    Json(payload): Json<CreateRefundRequest>,
) -> Result<(StatusCode, Json<CreateRefundResponse>), AppError> {
    // Refunds are an operational action, not a customer one.
    if !caller.role.is_global_admin() && !caller.role.is_school_staff() {
        return Err(AppError::Forbidden(anyhow::anyhow!("Access denied")));
    }

    tracing::info!(
        caller_id = %caller.user_id,
        transaction_id = %payload.transaction_id,
        "Initiating refund"
    );

    let response = state.orchestrator.create_refund(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
