//! Subscription model, owned by the subscription subsystem.
//!
//! The payment core may transition `past_due -> active` on successful
//! payment and recompute `next_billing_date` from webhook events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Cancelled,
    Inactive,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Inactive => "inactive",
        }
    }

    /// Whether a new payment order may be raised against the subscription.
    pub fn is_payable(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::PastDue)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub student_id: Uuid,
    pub subscription_plan_id: Uuid,
    pub plan_name: String,
    /// Gateway-side subscription reference, matched by webhook events.
    pub gateway_subscription_id: Option<String>,
    pub status: SubscriptionStatus,
    /// Billing amount in minor units.
    pub billing_amount: i64,
    pub currency: String,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
