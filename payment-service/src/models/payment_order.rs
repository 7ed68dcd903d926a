//! Payment order: a gateway-side payment attempt tied to exactly one order
//! or one subscription. Never deleted; serves as the audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentOrderStatus {
    Created,
    Paid,
    Failed,
    Expired,
}

impl PaymentOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOrderStatus::Created => "created",
            PaymentOrderStatus::Paid => "paid",
            PaymentOrderStatus::Failed => "failed",
            PaymentOrderStatus::Expired => "expired",
        }
    }
}

/// The single target a payment order is raised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Order(Uuid),
    Subscription(Uuid),
}

impl PaymentTarget {
    pub fn order_id(&self) -> Option<Uuid> {
        match self {
            PaymentTarget::Order(id) => Some(*id),
            PaymentTarget::Subscription(_) => None,
        }
    }

    pub fn subscription_id(&self) -> Option<Uuid> {
        match self {
            PaymentTarget::Order(_) => None,
            PaymentTarget::Subscription(id) => Some(*id),
        }
    }

    pub fn reference(&self) -> String {
        match self {
            PaymentTarget::Order(id) => format!("order:{}", id),
            PaymentTarget::Subscription(id) => format!("subscription:{}", id),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: Uuid,
    /// External gateway order reference.
    pub gateway_order_id: String,
    /// Amount in minor units (paise).
    pub amount: i64,
    pub currency: String,
    pub status: PaymentOrderStatus,
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub receipt: String,
    pub metadata: Option<serde_json::Value>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentOrder {
    pub fn target(&self) -> Option<PaymentTarget> {
        match (self.order_id, self.subscription_id) {
            (Some(id), None) => Some(PaymentTarget::Order(id)),
            (None, Some(id)) => Some(PaymentTarget::Subscription(id)),
            _ => None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Client-supplied metadata attached to a payment order. Kept as a typed
/// map in memory; serialized only at the persistence and gateway edges.
pub type PaymentMetadata = BTreeMap<String, String>;
