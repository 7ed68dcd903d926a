//! Order model, owned by the order-management subsystem.
//!
//! The payment core reads orders and writes only `payment_status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Order fulfilment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Completed => "completed",
        }
    }
}

/// Payment status on an order; this core's column to maintain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl OrderPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderPaymentStatus::Pending => "pending",
            OrderPaymentStatus::Paid => "paid",
            OrderPaymentStatus::Failed => "failed",
        }
    }
}

/// Structured order metadata. Persisted as JSONB; parsed only at the
/// persistence edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderMetadata {
    /// Optional application-level expiry for the order itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub student_id: Uuid,
    pub school_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    /// Total in minor units (paise).
    pub total_amount: i64,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Parse the structured metadata payload. Unknown shapes degrade to the
    /// default rather than failing a read path.
    pub fn parsed_metadata(&self) -> OrderMetadata {
        self.metadata
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Whether the order's embedded expiry has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.parsed_metadata().expires_at, Some(e) if e < now)
    }
}

/// Line item on an order; read-only input to the order detail view.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_name: String,
    pub quantity: i32,
    /// Unit price in minor units.
    pub unit_price: i64,
}

/// Tracking history entry; read-only input to the order detail view.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: String,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order_with_metadata(metadata: Option<serde_json::Value>) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            status: OrderStatus::Pending,
            payment_status: OrderPaymentStatus::Pending,
            total_amount: 50_000,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn expired_metadata_is_detected() {
        let past = Utc::now() - Duration::hours(1);
        let order = order_with_metadata(Some(
            serde_json::json!({ "expires_at": past.to_rfc3339() }),
        ));
        assert!(order.is_expired(Utc::now()));
    }

    #[test]
    fn missing_metadata_never_expires() {
        let order = order_with_metadata(None);
        assert!(!order.is_expired(Utc::now()));
    }

    #[test]
    fn malformed_metadata_degrades_to_default() {
        let order = order_with_metadata(Some(serde_json::json!("not an object")));
        assert!(!order.is_expired(Utc::now()));
    }
}
