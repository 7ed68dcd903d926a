//! Shared test harness: an in-memory `PaymentStore`, a no-op cache, a fake
//! sleeper for deterministic backoff assertions, and gateway fixtures for
//! wiremock.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mealpay_core::error::AppError;
use mealpay_core::utils::signature::compute_signature;
use mealpay_payment::config::{PaymentRules, RazorpayConfig};
use mealpay_payment::dtos::CreatePaymentOrderRequest;
use mealpay_payment::models::{
    Caller, Order, OrderItem, OrderPaymentStatus, OrderStatus, PaymentOrder, PaymentOrderStatus,
    PaymentRefund, PaymentTransaction, RefundStatus, Role, Subscription, SubscriptionStatus,
    TrackingEvent, TransactionStatus,
};
use mealpay_payment::services::cache::PaymentCache;
use mealpay_payment::services::razorpay::{RazorpayClient, RetryPolicy, Sleeper};
use mealpay_payment::services::store::PaymentStore;
use mealpay_payment::services::PaymentOrchestrator;
use secrecy::Secret;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "test_webhook_secret";

#[derive(Default, Clone)]
pub struct StoreState {
    pub orders: HashMap<Uuid, Order>,
    pub subscriptions: HashMap<Uuid, Subscription>,
    /// (parent_id, student_id)
    pub parent_links: HashSet<(Uuid, Uuid)>,
    pub payment_orders: Vec<PaymentOrder>,
    pub transactions: Vec<PaymentTransaction>,
    pub refunds: Vec<PaymentRefund>,
    pub order_items: Vec<OrderItem>,
    pub tracking: Vec<TrackingEvent>,
}

/// In-memory store double. Mimics the transactional side effects of the
/// real database service and records which methods were called.
#[derive(Default)]
pub struct InMemoryStore {
    pub state: Mutex<StoreState>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn add_order(&self, order: Order) {
        self.state.lock().unwrap().orders.insert(order.id, order);
    }

    pub fn add_subscription(&self, subscription: Subscription) {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .insert(subscription.id, subscription);
    }

    pub fn link_parent(&self, parent_id: Uuid, student_id: Uuid) {
        self.state
            .lock()
            .unwrap()
            .parent_links
            .insert((parent_id, student_id));
    }

    pub fn add_payment_order(&self, payment_order: PaymentOrder) {
        self.state.lock().unwrap().payment_orders.push(payment_order);
    }

    pub fn add_transaction(&self, transaction: PaymentTransaction) {
        self.state.lock().unwrap().transactions.push(transaction);
    }

    pub fn add_refund(&self, refund: PaymentRefund) {
        self.state.lock().unwrap().refunds.push(refund);
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        self.record("get_order");
        Ok(self.state.lock().unwrap().orders.get(&order_id).cloned())
    }

    async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        self.record("get_subscription");
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .get(&subscription_id)
            .cloned())
    }

    async fn is_parent_of(&self, parent_id: Uuid, student_id: Uuid) -> Result<bool, AppError> {
        self.record("is_parent_of");
        Ok(self
            .state
            .lock()
            .unwrap()
            .parent_links
            .contains(&(parent_id, student_id)))
    }

    async fn create_payment_order(&self, payment_order: &PaymentOrder) -> Result<(), AppError> {
        self.record("create_payment_order");
        let mut state = self.state.lock().unwrap();
        state.payment_orders.push(payment_order.clone());
        if let Some(order_id) = payment_order.order_id {
            if let Some(order) = state.orders.get_mut(&order_id) {
                order.payment_status = OrderPaymentStatus::Pending;
            }
        }
        if let Some(subscription_id) = payment_order.subscription_id {
            if let Some(subscription) = state.subscriptions.get_mut(&subscription_id) {
                if subscription.status == SubscriptionStatus::PastDue {
                    subscription.status = SubscriptionStatus::Active;
                }
            }
        }
        Ok(())
    }

    async fn find_payment_order_by_gateway_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<PaymentOrder>, AppError> {
        self.record("find_payment_order_by_gateway_id");
        Ok(self
            .state
            .lock()
            .unwrap()
            .payment_orders
            .iter()
            .find(|po| po.gateway_order_id == gateway_order_id)
            .cloned())
    }

    async fn list_payment_orders_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<PaymentOrder>, AppError> {
        self.record("list_payment_orders_for_order");
        Ok(self
            .state
            .lock()
            .unwrap()
            .payment_orders
            .iter()
            .filter(|po| po.order_id == Some(order_id))
            .cloned()
            .collect())
    }

    async fn find_transaction_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        self.record("find_transaction_by_gateway_payment_id");
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|t| t.gateway_payment_id == gateway_payment_id)
            .cloned())
    }

    async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        self.record("get_transaction");
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .cloned())
    }

    async fn record_capture(
        &self,
        payment_order: &PaymentOrder,
        transaction: &PaymentTransaction,
    ) -> Result<(), AppError> {
        self.record("record_capture");
        let mut state = self.state.lock().unwrap();
        state.transactions.push(transaction.clone());
        if let Some(po) = state
            .payment_orders
            .iter_mut()
            .find(|po| po.id == payment_order.id)
        {
            po.status = PaymentOrderStatus::Paid;
        }
        if let Some(order_id) = payment_order.order_id {
            if let Some(order) = state.orders.get_mut(&order_id) {
                order.payment_status = OrderPaymentStatus::Paid;
            }
        }
        if let Some(subscription_id) = payment_order.subscription_id {
            if let Some(subscription) = state.subscriptions.get_mut(&subscription_id) {
                if subscription.status == SubscriptionStatus::PastDue {
                    subscription.status = SubscriptionStatus::Active;
                }
            }
        }
        Ok(())
    }

    async fn insert_refund(&self, refund: &PaymentRefund) -> Result<(), AppError> {
        self.record("insert_refund");
        self.state.lock().unwrap().refunds.push(refund.clone());
        Ok(())
    }

    async fn mark_transaction_captured(
        &self,
        gateway_payment_id: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        self.record("mark_transaction_captured");
        let mut state = self.state.lock().unwrap();
        let mut updated = 0;
        for transaction in state
            .transactions
            .iter_mut()
            .filter(|t| t.gateway_payment_id == gateway_payment_id)
        {
            if transaction.status != TransactionStatus::Captured {
                transaction.status = TransactionStatus::Captured;
                transaction.captured_at = Some(captured_at);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_transaction_failed(&self, gateway_payment_id: &str) -> Result<u64, AppError> {
        self.record("mark_transaction_failed");
        let mut state = self.state.lock().unwrap();
        let mut updated = 0;
        for transaction in state
            .transactions
            .iter_mut()
            .filter(|t| t.gateway_payment_id == gateway_payment_id)
        {
            if transaction.status != TransactionStatus::Failed {
                transaction.status = TransactionStatus::Failed;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_refund_processed(
        &self,
        gateway_refund_id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        self.record("mark_refund_processed");
        let mut state = self.state.lock().unwrap();
        let mut updated = 0;
        for refund in state
            .refunds
            .iter_mut()
            .filter(|r| r.gateway_refund_id.as_deref() == Some(gateway_refund_id))
        {
            if refund.status == RefundStatus::Pending {
                refund.status = RefundStatus::Processed;
                refund.processed_at = Some(processed_at);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn reactivate_subscription(
        &self,
        gateway_subscription_id: &str,
        next_billing_date: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError> {
        self.record("reactivate_subscription");
        let mut state = self.state.lock().unwrap();
        let mut updated = 0;
        for subscription in state.subscriptions.values_mut().filter(|s| {
            s.gateway_subscription_id.as_deref() == Some(gateway_subscription_id)
        }) {
            subscription.status = SubscriptionStatus::Active;
            if next_billing_date.is_some() {
                subscription.next_billing_date = next_billing_date;
            }
            updated += 1;
        }
        Ok(updated)
    }

    async fn list_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        self.record("list_order_items");
        Ok(self
            .state
            .lock()
            .unwrap()
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_order_tracking(&self, order_id: Uuid) -> Result<Vec<TrackingEvent>, AppError> {
        self.record("list_order_tracking");
        Ok(self
            .state
            .lock()
            .unwrap()
            .tracking
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect())
    }
}

/// Cache double that remembers nothing but records invalidations.
#[derive(Default)]
pub struct NoopCache {
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl PaymentCache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, AppError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Sleeper that records requested delays instead of waiting.
#[derive(Default)]
pub struct FakeSleeper {
    pub delays: Mutex<Vec<std::time::Duration>>,
}

#[async_trait]
impl Sleeper for FakeSleeper {
    async fn sleep(&self, duration: std::time::Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn test_rules() -> PaymentRules {
    PaymentRules::default()
}

pub fn gateway_config(base_url: &str) -> RazorpayConfig {
    RazorpayConfig {
        key_id: "rzp_test_key".to_string(),
        key_secret: Secret::new("test_key_secret".to_string()),
        webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
        api_base_url: base_url.to_string(),
    }
}

pub fn gateway_client(base_url: &str) -> (RazorpayClient, Arc<FakeSleeper>) {
    let sleeper = Arc::new(FakeSleeper::default());
    let client = RazorpayClient::new(
        gateway_config(base_url),
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: std::time::Duration::from_millis(100),
        },
        sleeper.clone(),
    );
    (client, sleeper)
}

pub struct TestHarness {
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<NoopCache>,
    pub sleeper: Arc<FakeSleeper>,
    pub orchestrator: PaymentOrchestrator,
}

pub fn harness(base_url: &str) -> TestHarness {
    let store = InMemoryStore::new();
    let cache = Arc::new(NoopCache::default());
    let (client, sleeper) = gateway_client(base_url);
    let orchestrator = PaymentOrchestrator::new(
        store.clone(),
        client,
        cache.clone(),
        test_rules(),
    );
    TestHarness {
        store,
        cache,
        sleeper,
        orchestrator,
    }
}

// -- fixtures -----------------------------------------------------------------

pub fn create_request(
    amount: f64,
    order_id: Option<Uuid>,
    subscription_id: Option<Uuid>,
) -> CreatePaymentOrderRequest {
    CreatePaymentOrderRequest {
        amount,
        currency: "INR".to_string(),
        order_id,
        subscription_id,
        metadata: None,
        notes: None,
        description: None,
    }
}

pub fn pending_order(user_id: Uuid) -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        user_id,
        student_id: Uuid::new_v4(),
        school_id: Uuid::new_v4(),
        status: OrderStatus::Pending,
        payment_status: OrderPaymentStatus::Pending,
        total_amount: 50_000,
        metadata: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn past_due_subscription(user_id: Uuid) -> Subscription {
    let now = Utc::now();
    Subscription {
        id: Uuid::new_v4(),
        user_id,
        student_id: Uuid::new_v4(),
        subscription_plan_id: Uuid::new_v4(),
        plan_name: "Weekly Lunch".to_string(),
        gateway_subscription_id: Some("sub_GW1".to_string()),
        status: SubscriptionStatus::PastDue,
        billing_amount: 50_000,
        currency: "INR".to_string(),
        next_billing_date: Some(now),
        created_at: now,
        updated_at: now,
    }
}

pub fn parent_caller() -> Caller {
    Caller {
        user_id: Uuid::new_v4(),
        role: Role::Parent,
        school_id: None,
    }
}

pub fn created_payment_order(order_id: Option<Uuid>, gateway_order_id: &str) -> PaymentOrder {
    let now = Utc::now();
    PaymentOrder {
        id: Uuid::new_v4(),
        gateway_order_id: gateway_order_id.to_string(),
        amount: 50_000,
        currency: "INR".to_string(),
        status: PaymentOrderStatus::Created,
        user_id: Uuid::new_v4(),
        order_id,
        subscription_id: order_id.is_none().then(Uuid::new_v4),
        receipt: "rcpt_test_1".to_string(),
        metadata: None,
        expires_at: now + Duration::hours(24),
        created_at: now,
        updated_at: now,
    }
}

pub fn captured_transaction(
    payment_order_id: Uuid,
    gateway_payment_id: &str,
    amount: i64,
) -> PaymentTransaction {
    let now = Utc::now();
    PaymentTransaction {
        id: Uuid::new_v4(),
        payment_order_id,
        gateway_payment_id: gateway_payment_id.to_string(),
        method: Some("upi".to_string()),
        amount,
        currency: "INR".to_string(),
        status: TransactionStatus::Captured,
        fees: None,
        captured_at: Some(now),
        created_at: now,
    }
}

// -- gateway payloads ---------------------------------------------------------

pub fn gateway_order_json(id: &str, amount: i64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "entity": "order",
        "amount": amount,
        "currency": "INR",
        "receipt": "rcpt_test_1",
        "status": "created",
        "created_at": Utc::now().timestamp(),
    })
}

pub fn gateway_payment_json(
    id: &str,
    order_id: &str,
    amount: i64,
    status: &str,
) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "entity": "payment",
        "amount": amount,
        "currency": "INR",
        "status": status,
        "order_id": order_id,
        "method": "upi",
        "fee": 590,
        "tax": 90,
        "captured": status == "captured",
    })
}

pub fn gateway_refund_json(id: &str, payment_id: &str, amount: i64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "entity": "refund",
        "payment_id": payment_id,
        "amount": amount,
        "currency": "INR",
        "status": "pending",
    })
}

// -- signatures ---------------------------------------------------------------

pub fn sign_capture(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    compute_signature(
        WEBHOOK_SECRET,
        &format!("{}|{}", gateway_order_id, gateway_payment_id),
    )
    .unwrap()
}

pub fn sign_webhook_body(body: &str) -> String {
    compute_signature(WEBHOOK_SECRET, body).unwrap()
}
