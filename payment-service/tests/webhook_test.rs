//! Webhook verification and settlement transitions.

mod common;

use common::*;
use mealpay_payment::models::{RefundStatus, SubscriptionStatus, TransactionStatus};
use wiremock::MockServer;

fn payment_event(event: &str, gateway_payment_id: &str) -> String {
    serde_json::json!({
        "entity": "event",
        "event": event,
        "payload": {
            "payment": {
                "entity": {
                    "id": gateway_payment_id,
                    "amount": 50000,
                    "currency": "INR",
                    "status": if event == "payment.captured" { "captured" } else { "failed" },
                    "order_id": "order_GW1",
                    "method": "upi",
                    "captured": event == "payment.captured"
                }
            }
        },
        "created_at": 1724800000
    })
    .to_string()
}

#[tokio::test]
async fn webhook_signature_over_raw_body_is_enforced() {
    let server = MockServer::start().await;
    let (client, _) = gateway_client(&server.uri());

    let body = payment_event("payment.captured", "pay_1");
    let signature = sign_webhook_body(&body);

    assert!(client.verify_webhook_signature(&body, &signature).unwrap());

    // One flipped byte in the body invalidates the signature.
    let tampered = body.replace("pay_1", "pay_2");
    assert!(!client
        .verify_webhook_signature(&tampered, &signature)
        .unwrap());
}

#[tokio::test]
async fn payment_captured_event_settles_pending_transaction() {
    let server = MockServer::start().await;
    let h = harness(&server.uri());
    let po = created_payment_order(None, "order_GW1");
    let mut transaction = captured_transaction(po.id, "pay_1", 50_000);
    transaction.status = TransactionStatus::Failed; // pre-settlement state
    transaction.captured_at = None;
    h.store.add_payment_order(po);
    h.store.add_transaction(transaction);

    let (client, _) = gateway_client(&server.uri());
    let event = client
        .parse_webhook_event(&payment_event("payment.captured", "pay_1"))
        .unwrap();
    h.orchestrator.apply_webhook_event(&event).await.unwrap();

    let state = h.store.snapshot();
    assert_eq!(state.transactions[0].status, TransactionStatus::Captured);
    assert!(state.transactions[0].captured_at.is_some());
}

#[tokio::test]
async fn payment_captured_replay_changes_nothing() {
    let server = MockServer::start().await;
    let h = harness(&server.uri());
    let po = created_payment_order(None, "order_GW1");
    let transaction = captured_transaction(po.id, "pay_1", 50_000);
    let original_captured_at = transaction.captured_at;
    h.store.add_payment_order(po);
    h.store.add_transaction(transaction);

    let (client, _) = gateway_client(&server.uri());
    let event = client
        .parse_webhook_event(&payment_event("payment.captured", "pay_1"))
        .unwrap();
    h.orchestrator.apply_webhook_event(&event).await.unwrap();

    let state = h.store.snapshot();
    assert_eq!(state.transactions.len(), 1);
    assert_eq!(state.transactions[0].captured_at, original_captured_at);
}

#[tokio::test]
async fn payment_failed_event_marks_transaction_failed() {
    let server = MockServer::start().await;
    let h = harness(&server.uri());
    let po = created_payment_order(None, "order_GW1");
    let transaction = captured_transaction(po.id, "pay_1", 50_000);
    h.store.add_payment_order(po);
    h.store.add_transaction(transaction);

    let (client, _) = gateway_client(&server.uri());
    let event = client
        .parse_webhook_event(&payment_event("payment.failed", "pay_1"))
        .unwrap();
    h.orchestrator.apply_webhook_event(&event).await.unwrap();

    assert_eq!(
        h.store.snapshot().transactions[0].status,
        TransactionStatus::Failed
    );
}

#[tokio::test]
async fn unknown_gateway_payment_id_is_an_acknowledged_noop() {
    let server = MockServer::start().await;
    let h = harness(&server.uri());

    let (client, _) = gateway_client(&server.uri());
    let event = client
        .parse_webhook_event(&payment_event("payment.captured", "pay_unknown"))
        .unwrap();

    // No matching row; the event is still acknowledged.
    h.orchestrator.apply_webhook_event(&event).await.unwrap();
    assert!(h.store.snapshot().transactions.is_empty());
}

#[tokio::test]
async fn refund_processed_event_stamps_processed_at() {
    let server = MockServer::start().await;
    let h = harness(&server.uri());
    let po = created_payment_order(None, "order_GW1");
    let transaction = captured_transaction(po.id, "pay_1", 50_000);
    let refund = mealpay_payment::models::PaymentRefund {
        id: uuid::Uuid::new_v4(),
        payment_id: transaction.id,
        gateway_refund_id: Some("rfnd_1".to_string()),
        amount: 50_000,
        currency: "INR".to_string(),
        status: RefundStatus::Pending,
        reason: None,
        processed_at: None,
        created_at: chrono::Utc::now(),
    };
    h.store.add_payment_order(po);
    h.store.add_transaction(transaction);
    h.store.add_refund(refund);

    let body = serde_json::json!({
        "entity": "event",
        "event": "refund.processed",
        "payload": {
            "refund": {
                "entity": {
                    "id": "rfnd_1",
                    "payment_id": "pay_1",
                    "amount": 50000,
                    "currency": "INR",
                    "status": "processed"
                }
            }
        },
        "created_at": 1724800000
    })
    .to_string();

    let (client, _) = gateway_client(&server.uri());
    let event = client.parse_webhook_event(&body).unwrap();
    h.orchestrator.apply_webhook_event(&event).await.unwrap();

    let state = h.store.snapshot();
    assert_eq!(state.refunds[0].status, RefundStatus::Processed);
    assert!(state.refunds[0].processed_at.is_some());
}

#[tokio::test]
async fn subscription_charged_reactivates_and_moves_billing_date() {
    let server = MockServer::start().await;
    let h = harness(&server.uri());
    let caller = parent_caller();
    let subscription = past_due_subscription(caller.user_id);
    let subscription_id = subscription.id;
    h.store.add_subscription(subscription);

    let current_end: i64 = 1_727_400_000;
    let body = serde_json::json!({
        "entity": "event",
        "event": "subscription.charged",
        "payload": {
            "subscription": {
                "entity": {
                    "id": "sub_GW1",
                    "status": "active",
                    "current_end": current_end
                }
            }
        },
        "created_at": 1724800000
    })
    .to_string();

    let (client, _) = gateway_client(&server.uri());
    let event = client.parse_webhook_event(&body).unwrap();
    h.orchestrator.apply_webhook_event(&event).await.unwrap();

    let state = h.store.snapshot();
    let subscription = &state.subscriptions[&subscription_id];
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    assert_eq!(
        subscription.next_billing_date.map(|d| d.timestamp()),
        Some(current_end)
    );
}

#[tokio::test]
async fn unhandled_event_types_are_ignored() {
    let server = MockServer::start().await;
    let h = harness(&server.uri());

    let body = serde_json::json!({
        "entity": "event",
        "event": "payment.authorized",
        "payload": {},
        "created_at": 1724800000
    })
    .to_string();

    let (client, _) = gateway_client(&server.uri());
    let event = client.parse_webhook_event(&body).unwrap();

    h.orchestrator.apply_webhook_event(&event).await.unwrap();
    assert!(h.store.calls().is_empty());
}
