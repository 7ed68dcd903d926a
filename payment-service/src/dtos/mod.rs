use crate::models::{
    Order, OrderItem, PaymentMetadata, PaymentOrder, PaymentOrderStatus, RefundStatus,
    Subscription, TrackingEvent, TransactionStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request to create a new payment order.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePaymentOrderRequest {
    /// Amount in major units (rupees); persisted and charged in minor units.
    #[validate(range(min = 0.01))]
    pub amount: f64,
    /// Currency code (ISO 4217).
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
    /// Target order; mutually exclusive with `subscription_id`.
    pub order_id: Option<Uuid>,
    /// Target subscription; mutually exclusive with `order_id`.
    pub subscription_id: Option<Uuid>,
    /// Size-capped metadata stored with the payment order.
    pub metadata: Option<PaymentMetadata>,
    /// Count-capped notes forwarded to the gateway.
    pub notes: Option<PaymentMetadata>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

/// Redacted echo of the payment target for client display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetEcho {
    Order { id: Uuid, school_id: Uuid },
    Subscription { id: Uuid, plan_name: String },
}

impl TargetEcho {
    pub fn for_order(order: &Order) -> Self {
        TargetEcho::Order {
            id: order.id,
            school_id: order.school_id,
        }
    }

    pub fn for_subscription(subscription: &Subscription) -> Self {
        TargetEcho::Subscription {
            id: subscription.id,
            plan_name: subscription.plan_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentOrderResponse {
    pub payment_order_id: Uuid,
    /// Gateway order id to hand to the checkout frontend.
    pub gateway_order_id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub status: PaymentOrderStatus,
    pub expires_at: DateTime<Utc>,
    /// Gateway key id for frontend initialization.
    pub gateway_key_id: String,
    pub target: TargetEcho,
}

/// Capture confirmation from the checkout frontend.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CapturePaymentRequest {
    #[validate(length(min = 1))]
    pub gateway_order_id: String,
    #[validate(length(min = 1))]
    pub gateway_payment_id: String,
    #[validate(length(min = 1))]
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapturePaymentResponse {
    pub payment_order_id: Uuid,
    pub transaction_id: Uuid,
    pub gateway_payment_id: String,
    pub status: TransactionStatus,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRefundRequest {
    pub transaction_id: Uuid,
    /// Refund amount in major units; defaults to the full captured amount.
    #[validate(range(min = 0.01))]
    pub amount: Option<f64>,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRefundResponse {
    pub refund_id: Uuid,
    pub gateway_refund_id: Option<String>,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub status: RefundStatus,
}

/// Payment summary fragment of the composite order detail.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummary {
    pub payment_order_id: Uuid,
    pub gateway_order_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentOrderStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&PaymentOrder> for PaymentSummary {
    fn from(po: &PaymentOrder) -> Self {
        Self {
            payment_order_id: po.id,
            gateway_order_id: po.gateway_order_id.clone(),
            amount: po.amount,
            currency: po.currency.clone(),
            status: po.status,
            expires_at: po.expires_at,
            created_at: po.created_at,
        }
    }
}

/// Composite order detail.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetailResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub tracking: Vec<TrackingEvent>,
    pub payments: Vec<PaymentSummary>,
}
