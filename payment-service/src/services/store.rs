//! Persistence seam for the payment core.
//!
//! The orchestrator and handlers depend on this trait rather than on a
//! concrete pool, so tests can substitute an in-memory store.

use crate::models::{
    Order, OrderItem, PaymentOrder, PaymentRefund, PaymentTransaction, Subscription,
    TrackingEvent,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mealpay_core::error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    // -- collaborator entities ------------------------------------------------

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError>;

    async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError>;

    /// Student -> parent relation lookup used by access control.
    async fn is_parent_of(&self, parent_id: Uuid, student_id: Uuid) -> Result<bool, AppError>;

    // -- payment orders -------------------------------------------------------

    /// Insert the payment order and, in the same transaction, mark the
    /// target order's payment status pending (or flip a past_due
    /// subscription back to active). Both writes commit or both roll back.
    async fn create_payment_order(&self, payment_order: &PaymentOrder) -> Result<(), AppError>;

    async fn find_payment_order_by_gateway_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<PaymentOrder>, AppError>;

    /// Payment orders raised against an order, newest first.
    async fn list_payment_orders_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<PaymentOrder>, AppError>;

    // -- transactions ---------------------------------------------------------

    async fn find_transaction_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<PaymentTransaction>, AppError>;

    async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<PaymentTransaction>, AppError>;

    /// Record a capture: insert the transaction, mark the payment order
    /// paid, and propagate the paid state to the target, transactionally.
    async fn record_capture(
        &self,
        payment_order: &PaymentOrder,
        transaction: &PaymentTransaction,
    ) -> Result<(), AppError>;

    // -- refunds --------------------------------------------------------------

    async fn insert_refund(&self, refund: &PaymentRefund) -> Result<(), AppError>;

    // -- webhook transitions (matched on gateway identifiers) -----------------

    /// Returns the number of rows transitioned; zero is a valid no-op.
    async fn mark_transaction_captured(
        &self,
        gateway_payment_id: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    async fn mark_transaction_failed(&self, gateway_payment_id: &str) -> Result<u64, AppError>;

    async fn mark_refund_processed(
        &self,
        gateway_refund_id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    /// Reactivate a charged subscription and recompute its next billing
    /// date from the gateway-reported period end.
    async fn reactivate_subscription(
        &self,
        gateway_subscription_id: &str,
        next_billing_date: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError>;

    // -- order detail fragments -----------------------------------------------

    async fn list_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError>;

    async fn list_order_tracking(&self, order_id: Uuid) -> Result<Vec<TrackingEvent>, AppError>;
}
