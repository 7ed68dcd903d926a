//! Composite order detail endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use mealpay_core::error::AppError;
use uuid::Uuid;

use crate::access;
use crate::dtos::{OrderDetailResponse, PaymentSummary};
use crate::middleware::CallerContext;
use crate::AppState;

/// Fetch an order together with its items, tracking history, and payment
/// summary. The independent fragments are queried concurrently and joined.
pub async fn get_order_detail(
    State(state): State<AppState>,
    CallerContext(caller): CallerContext,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetailResponse>, AppError> {
    let store = state.orchestrator.store();

    let order = store
        .get_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

    access::authorize_order_read(store, &caller, &order).await?;

    let (items, tracking, payment_orders) = tokio::try_join!(
        store.list_order_items(order_id),
        store.list_order_tracking(order_id),
        store.list_payment_orders_for_order(order_id),
    )?;

    Ok(Json(OrderDetailResponse {
        order,
        items,
        tracking,
        payments: payment_orders.iter().map(PaymentSummary::from).collect(),
    }))
}
