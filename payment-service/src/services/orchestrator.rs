//! Payment-order orchestration.
//!
//! Validation runs in a fixed order: request schema, then business rules,
//! then access and target state. Nothing reaches the gateway or the
//! database until all three pass. The local write after a gateway call is
//! transactional; a gateway order whose local write failed is logged
//! loudly and surfaced, never silently reconciled.

use crate::access;
use crate::config::PaymentRules;
use crate::dtos::{
    CapturePaymentRequest, CapturePaymentResponse, CreatePaymentOrderRequest,
    CreatePaymentOrderResponse, CreateRefundRequest, CreateRefundResponse, TargetEcho,
};
use crate::models::{
    Caller, PaymentOrder, PaymentOrderStatus, PaymentRefund, PaymentTarget, PaymentTransaction,
    RefundStatus, TransactionStatus,
};
use crate::services::cache::{payment_order_key, PaymentCache};
use crate::services::metrics::{CAPTURES_TOTAL, PAYMENT_ORDERS_TOTAL, WEBHOOK_EVENTS_TOTAL};
use crate::services::razorpay::{GatewayError, RazorpayClient, WebhookEvent};
use crate::services::store::PaymentStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use mealpay_core::error::AppError;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Convert a major-unit amount to integer minor units (paise).
///
/// Rejects non-positive amounts and amounts that are not a whole multiple
/// of the smallest currency unit.
pub fn to_minor_units(amount: f64) -> Result<i64, AppError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Validation failed: amount must be positive"
        )));
    }

    let scaled = amount * 100.0;
    let rounded = scaled.round();
    if (scaled - rounded).abs() > 1e-6 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Validation failed: amount must be a multiple of the smallest currency unit"
        )));
    }

    Ok(rounded as i64)
}

pub struct PaymentOrchestrator {
    store: Arc<dyn PaymentStore>,
    gateway: RazorpayClient,
    cache: Arc<dyn PaymentCache>,
    rules: PaymentRules,
}

impl PaymentOrchestrator {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: RazorpayClient,
        cache: Arc<dyn PaymentCache>,
        rules: PaymentRules,
    ) -> Self {
        Self {
            store,
            gateway,
            cache,
            rules,
        }
    }

    pub fn gateway_key_id(&self) -> &str {
        self.gateway.key_id()
    }

    pub fn store(&self) -> &dyn PaymentStore {
        self.store.as_ref()
    }

    /// Create a payment order: validate, authorize, create the gateway-side
    /// order (retried), then persist locally in one transaction.
    pub async fn create_payment_order(
        &self,
        request: CreatePaymentOrderRequest,
        caller: &Caller,
    ) -> Result<CreatePaymentOrderResponse, AppError> {
        // 1. schema
        request.validate()?;

        // 2. business rules
        let amount_minor = to_minor_units(request.amount)?;
        if amount_minor > self.rules.amount_ceiling_minor {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Validation failed: amount exceeds the maximum of {} minor units",
                self.rules.amount_ceiling_minor
            )));
        }
        if !request.currency.eq_ignore_ascii_case(&self.rules.currency) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Validation failed: unsupported currency '{}', expected '{}'",
                request.currency,
                self.rules.currency
            )));
        }

        let target = match (request.order_id, request.subscription_id) {
            (Some(order_id), None) => PaymentTarget::Order(order_id),
            (None, Some(subscription_id)) => PaymentTarget::Subscription(subscription_id),
            _ => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Validation failed: exactly one of order_id or subscription_id is required"
                )));
            }
        };

        if let Some(ref metadata) = request.metadata {
            let serialized = serde_json::to_string(metadata)
                .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;
            if serialized.len() > self.rules.metadata_max_bytes {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Validation failed: metadata exceeds {} bytes",
                    self.rules.metadata_max_bytes
                )));
            }
        }
        if let Some(ref notes) = request.notes {
            if notes.len() > self.rules.notes_max_entries {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Validation failed: at most {} notes are allowed",
                    self.rules.notes_max_entries
                )));
            }
        }

        // 3. access and target state
        let now = Utc::now();
        let echo = match target {
            PaymentTarget::Order(order_id) => {
                let order = self
                    .store
                    .get_order(order_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;
                access::authorize_order_payment(self.store.as_ref(), caller, &order, now).await?;
                TargetEcho::for_order(&order)
            }
            PaymentTarget::Subscription(subscription_id) => {
                let subscription = self
                    .store
                    .get_subscription(subscription_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(anyhow::anyhow!("Subscription not found"))
                    })?;
                access::authorize_subscription_payment(self.store.as_ref(), caller, &subscription)
                    .await?;
                TargetEcho::for_subscription(&subscription)
            }
        };

        // 4. gateway order, then the transactional local write
        let payment_order_id = Uuid::new_v4();
        let receipt = receipt_for(&target, now);

        let mut notes = request.notes.clone().unwrap_or_default();
        notes.insert("target".to_string(), target.reference());
        notes.insert(
            "idempotency_key".to_string(),
            payment_order_id.to_string(),
        );

        let gateway_order = self
            .gateway
            .create_order(amount_minor, &self.rules.currency, &receipt, Some(&notes))
            .await
            .map_err(|e| {
                PAYMENT_ORDERS_TOTAL
                    .with_label_values(&[target_label(&target), "gateway_error"])
                    .inc();
                AppError::BadGateway(e.to_string())
            })?;

        let payment_order = PaymentOrder {
            id: payment_order_id,
            gateway_order_id: gateway_order.id.clone(),
            amount: amount_minor,
            currency: self.rules.currency.clone(),
            status: PaymentOrderStatus::Created,
            user_id: caller.user_id,
            order_id: target.order_id(),
            subscription_id: target.subscription_id(),
            receipt,
            metadata: request
                .metadata
                .as_ref()
                .map(|m| serde_json::to_value(m))
                .transpose()
                .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?,
            expires_at: now + Duration::hours(self.rules.expiry_hours),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.create_payment_order(&payment_order).await {
            // The gateway order exists but the local write rolled back.
            // Surfaced for reconciliation, never auto-repaired.
            tracing::error!(
                gateway_order_id = %gateway_order.id,
                payment_order_id = %payment_order.id,
                error = %e,
                "Gateway order created but local persistence failed"
            );
            PAYMENT_ORDERS_TOTAL
                .with_label_values(&[target_label(&target), "persistence_error"])
                .inc();
            return Err(e);
        }

        if let Err(e) = self
            .cache
            .set(
                &payment_order_key(&payment_order.gateway_order_id),
                &serde_json::to_string(&payment_order)
                    .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?,
                (self.rules.expiry_hours as u64) * 3600,
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to cache payment order");
        }

        PAYMENT_ORDERS_TOTAL
            .with_label_values(&[target_label(&target), "created"])
            .inc();

        tracing::info!(
            payment_order_id = %payment_order.id,
            gateway_order_id = %payment_order.gateway_order_id,
            amount = amount_minor,
            "Payment order created"
        );

        Ok(CreatePaymentOrderResponse {
            payment_order_id: payment_order.id,
            gateway_order_id: payment_order.gateway_order_id,
            amount: payment_order.amount,
            currency: payment_order.currency,
            status: payment_order.status,
            expires_at: payment_order.expires_at,
            gateway_key_id: self.gateway.key_id().to_string(),
            target: echo,
        })
    }

    /// Confirm a checkout capture: verify the signature, check the live
    /// gateway status (capturing explicitly if only authorized), and record
    /// the transaction. Replays are detected by gateway payment id and
    /// acknowledged without a second transaction row.
    pub async fn capture_payment(
        &self,
        request: CapturePaymentRequest,
    ) -> Result<CapturePaymentResponse, AppError> {
        request.validate()?;

        let valid = self
            .gateway
            .verify_capture_signature(
                &request.gateway_order_id,
                &request.gateway_payment_id,
                &request.signature,
            )
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;

        if !valid {
            CAPTURES_TOTAL.with_label_values(&["invalid_signature"]).inc();
            tracing::warn!(
                gateway_order_id = %request.gateway_order_id,
                gateway_payment_id = %request.gateway_payment_id,
                "Capture rejected: signature mismatch"
            );
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Invalid payment signature"
            )));
        }

        let payment_order = self
            .store
            .find_payment_order_by_gateway_id(&request.gateway_order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment order not found")))?;

        // Idempotency: a replayed capture is a no-op success.
        if let Some(existing) = self
            .store
            .find_transaction_by_gateway_payment_id(&request.gateway_payment_id)
            .await?
        {
            tracing::info!(
                gateway_payment_id = %request.gateway_payment_id,
                transaction_id = %existing.id,
                "Capture replay detected, returning existing transaction"
            );
            CAPTURES_TOTAL.with_label_values(&["replayed"]).inc();
            return Ok(CapturePaymentResponse {
                payment_order_id: payment_order.id,
                transaction_id: existing.id,
                gateway_payment_id: existing.gateway_payment_id,
                status: existing.status,
                message: "Payment already captured".to_string(),
            });
        }

        let now = Utc::now();
        if payment_order.is_expired(now) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Payment order has expired"
            )));
        }

        let payment = self
            .gateway
            .fetch_payment(&request.gateway_payment_id)
            .await
            .map_err(|e| AppError::BadGateway(e.to_string()))?;

        let payment = match payment.status.as_str() {
            "captured" => payment,
            "authorized" => self
                .gateway
                .capture_payment(
                    &request.gateway_payment_id,
                    payment_order.amount,
                    &payment_order.currency,
                )
                .await
                .map_err(|e| AppError::BadGateway(e.to_string()))?,
            other => {
                CAPTURES_TOTAL.with_label_values(&["not_captured"]).inc();
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Payment is not captured (gateway status: {})",
                    other
                )));
            }
        };

        let transaction = PaymentTransaction {
            id: Uuid::new_v4(),
            payment_order_id: payment_order.id,
            gateway_payment_id: payment.id.clone(),
            method: payment.method.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: TransactionStatus::Captured,
            fees: Some(serde_json::json!({ "fee": payment.fee, "tax": payment.tax })),
            captured_at: Some(now),
            created_at: now,
        };

        self.store
            .record_capture(&payment_order, &transaction)
            .await?;

        if let Err(e) = self
            .cache
            .delete(&payment_order_key(&payment_order.gateway_order_id))
            .await
        {
            tracing::warn!(error = %e, "Failed to invalidate payment order cache");
        }

        CAPTURES_TOTAL.with_label_values(&["captured"]).inc();

        tracing::info!(
            payment_order_id = %payment_order.id,
            transaction_id = %transaction.id,
            amount = transaction.amount,
            "Payment captured"
        );

        Ok(CapturePaymentResponse {
            payment_order_id: payment_order.id,
            transaction_id: transaction.id,
            gateway_payment_id: transaction.gateway_payment_id,
            status: transaction.status,
            message: "Payment captured".to_string(),
        })
    }

    /// Initiate a refund against a captured transaction. The gateway call
    /// is made exactly once; the refund row stays `pending` until the
    /// gateway confirms via webhook.
    pub async fn create_refund(
        &self,
        request: CreateRefundRequest,
    ) -> Result<CreateRefundResponse, AppError> {
        request.validate()?;

        let transaction = self
            .store
            .get_transaction(request.transaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

        if transaction.status != TransactionStatus::Captured {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Only captured transactions can be refunded"
            )));
        }

        let amount_minor = match request.amount {
            Some(amount) => to_minor_units(amount)?,
            None => transaction.amount,
        };
        if amount_minor > transaction.amount {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Refund amount exceeds captured amount"
            )));
        }

        let mut notes = BTreeMap::new();
        if let Some(ref reason) = request.reason {
            notes.insert("reason".to_string(), reason.clone());
        }

        let gateway_refund = self
            .gateway
            .create_refund(
                &transaction.gateway_payment_id,
                amount_minor,
                (!notes.is_empty()).then_some(&notes),
            )
            .await
            .map_err(|e| AppError::BadGateway(e.to_string()))?;

        let refund = PaymentRefund {
            id: Uuid::new_v4(),
            payment_id: transaction.id,
            gateway_refund_id: Some(gateway_refund.id.clone()),
            amount: amount_minor,
            currency: transaction.currency.clone(),
            status: RefundStatus::Pending,
            reason: request.reason.clone(),
            processed_at: None,
            created_at: Utc::now(),
        };

        self.store.insert_refund(&refund).await?;

        tracing::info!(
            refund_id = %refund.id,
            gateway_refund_id = %gateway_refund.id,
            amount = amount_minor,
            "Refund initiated"
        );

        Ok(CreateRefundResponse {
            refund_id: refund.id,
            gateway_refund_id: refund.gateway_refund_id,
            amount: refund.amount,
            currency: refund.currency,
            status: refund.status,
        })
    }

    /// Apply a verified webhook event. Matching is always by gateway
    /// identifiers; zero matched rows is an acknowledged no-op, and unknown
    /// event types are logged and ignored.
    pub async fn apply_webhook_event(&self, event: &WebhookEvent) -> Result<(), AppError> {
        WEBHOOK_EVENTS_TOTAL.with_label_values(&[&event.event]).inc();

        let now = Utc::now();
        match event.event.as_str() {
            "payment.captured" => {
                if let Some(ref payment) = event.payload.payment {
                    let updated = self
                        .store
                        .mark_transaction_captured(&payment.entity.id, now)
                        .await?;
                    tracing::info!(
                        gateway_payment_id = %payment.entity.id,
                        rows = updated,
                        "payment.captured applied"
                    );
                }
            }
            "payment.failed" => {
                if let Some(ref payment) = event.payload.payment {
                    let updated = self
                        .store
                        .mark_transaction_failed(&payment.entity.id)
                        .await?;
                    tracing::info!(
                        gateway_payment_id = %payment.entity.id,
                        rows = updated,
                        "payment.failed applied"
                    );
                }
            }
            "refund.processed" => {
                if let Some(ref refund) = event.payload.refund {
                    let updated = self
                        .store
                        .mark_refund_processed(&refund.entity.id, now)
                        .await?;
                    tracing::info!(
                        gateway_refund_id = %refund.entity.id,
                        rows = updated,
                        "refund.processed applied"
                    );
                }
            }
            "subscription.charged" => {
                if let Some(ref subscription) = event.payload.subscription {
                    let next_billing = subscription
                        .entity
                        .current_end
                        .and_then(|ts| Utc.timestamp_opt(ts, 0).single());
                    let updated = self
                        .store
                        .reactivate_subscription(&subscription.entity.id, next_billing)
                        .await?;
                    tracing::info!(
                        gateway_subscription_id = %subscription.entity.id,
                        rows = updated,
                        "subscription.charged applied"
                    );
                }
            }
            other => {
                tracing::debug!(event_type = %other, "Ignoring unhandled webhook event type");
            }
        }

        Ok(())
    }

    /// Expose the gateway for webhook signature verification in handlers.
    pub fn gateway(&self) -> &RazorpayClient {
        &self.gateway
    }
}

fn receipt_for(target: &PaymentTarget, now: DateTime<Utc>) -> String {
    let id = match target {
        PaymentTarget::Order(id) | PaymentTarget::Subscription(id) => id,
    };
    let hex = id.simple().to_string();
    format!("rcpt_{}_{}", &hex[..12], now.timestamp())
}

fn target_label(target: &PaymentTarget) -> &'static str {
    match target {
        PaymentTarget::Order(_) => "order",
        PaymentTarget::Subscription(_) => "subscription",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_major_units_to_paise() {
        assert_eq!(to_minor_units(500.0).unwrap(), 50_000);
        assert_eq!(to_minor_units(0.01).unwrap(), 1);
        assert_eq!(to_minor_units(123.45).unwrap(), 12_345);
    }

    #[test]
    fn rejects_non_positive_amounts() {
        assert!(to_minor_units(0.0).is_err());
        assert!(to_minor_units(-10.0).is_err());
        assert!(to_minor_units(f64::NAN).is_err());
    }

    #[test]
    fn rejects_fractional_paise() {
        assert!(to_minor_units(10.001).is_err());
    }

    #[test]
    fn receipt_is_bounded_and_prefixed() {
        let target = PaymentTarget::Order(Uuid::new_v4());
        let receipt = receipt_for(&target, Utc::now());
        assert!(receipt.starts_with("rcpt_"));
        // Razorpay caps receipts at 40 characters.
        assert!(receipt.len() <= 40);
    }
}
