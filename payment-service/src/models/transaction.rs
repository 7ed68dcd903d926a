//! Payment transaction: a captured or attempted charge against a payment
//! order. Immutable once captured except for refund-linked state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Captured,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Captured => "captured",
            TransactionStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub payment_order_id: Uuid,
    /// External gateway payment reference; unique, the idempotency key for
    /// capture and webhook matching.
    pub gateway_payment_id: String,
    pub method: Option<String>,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub status: TransactionStatus,
    /// Gateway fee breakdown as reported.
    pub fees: Option<serde_json::Value>,
    pub captured_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
