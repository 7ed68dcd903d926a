//! Access control for payment operations.
//!
//! Authorization is decided first (who may pay for this target), then the
//! target's state is checked (is there anything left to pay). Failures here
//! never reach the gateway or the persistence write path.

use crate::models::{Caller, Order, OrderPaymentStatus, OrderStatus, Subscription};
use crate::services::store::PaymentStore;
use chrono::{DateTime, Utc};
use mealpay_core::error::AppError;

/// Role/ownership decision for an order, with the parent relation already
/// resolved.
fn order_role_allows(caller: &Caller, order: &Order, is_parent: bool) -> bool {
    if caller.user_id == order.user_id {
        return true;
    }
    if is_parent {
        return true;
    }
    if caller.role.is_global_admin() {
        return true;
    }
    if caller.role.is_school_staff() && caller.school_id == Some(order.school_id) {
        return true;
    }
    false
}

/// State checks applied after authorization.
fn check_order_payable(order: &Order, now: DateTime<Utc>) -> Result<(), AppError> {
    if order.payment_status == OrderPaymentStatus::Paid {
        return Err(AppError::Conflict(anyhow::anyhow!("Order is already paid")));
    }
    if order.status == OrderStatus::Cancelled {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Cannot create payment for cancelled order"
        )));
    }
    if order.is_expired(now) {
        return Err(AppError::Conflict(anyhow::anyhow!("Order has expired")));
    }
    Ok(())
}

fn subscription_role_allows(caller: &Caller, subscription: &Subscription, is_parent: bool) -> bool {
    caller.user_id == subscription.user_id || is_parent || caller.role.is_global_admin()
}

/// Authorize creating a payment order against an order, then verify the
/// order is still payable.
pub async fn authorize_order_payment(
    store: &dyn PaymentStore,
    caller: &Caller,
    order: &Order,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    authorize_order_read(store, caller, order).await?;
    check_order_payable(order, now)
}

/// Authorize read access to an order (no state checks).
pub async fn authorize_order_read(
    store: &dyn PaymentStore,
    caller: &Caller,
    order: &Order,
) -> Result<(), AppError> {
    let is_parent = if caller.user_id == order.user_id || caller.role.is_global_admin() {
        false // relation lookup not needed
    } else {
        store.is_parent_of(caller.user_id, order.student_id).await?
    };

    if order_role_allows(caller, order, is_parent) {
        Ok(())
    } else {
        tracing::warn!(
            caller_id = %caller.user_id,
            role = caller.role.as_str(),
            order_id = %order.id,
            "Order access denied"
        );
        Err(AppError::Forbidden(anyhow::anyhow!("Access denied")))
    }
}

/// Authorize creating a payment order against a subscription, then verify
/// the subscription is in a payable state.
pub async fn authorize_subscription_payment(
    store: &dyn PaymentStore,
    caller: &Caller,
    subscription: &Subscription,
) -> Result<(), AppError> {
    let is_parent = if caller.user_id == subscription.user_id || caller.role.is_global_admin() {
        false
    } else {
        store
            .is_parent_of(caller.user_id, subscription.student_id)
            .await?
    };

    if !subscription_role_allows(caller, subscription, is_parent) {
        tracing::warn!(
            caller_id = %caller.user_id,
            role = caller.role.as_str(),
            subscription_id = %subscription.id,
            "Subscription access denied"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!("Access denied")));
    }

    if !subscription.status.is_payable() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Subscription is not payable"
        )));
    }

    Ok(())
}
