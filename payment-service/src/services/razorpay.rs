//! Razorpay payment gateway adapter.
//!
//! Implements the Orders API for payment initiation, the Payments API for
//! capture and refunds, and HMAC signature verification for checkout
//! confirmation and webhooks.
//!
//! Only order creation is retried (bounded, exponential backoff). Capture
//! and refund calls surface failures immediately so a flaky network can
//! never double-charge or double-refund.

use crate::config::RazorpayConfig;
use async_trait::async_trait;
use mealpay_core::utils::signature;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Razorpay credentials not configured")]
    Unconfigured,

    #[error("Razorpay error: {code} - {description}")]
    Api {
        code: String,
        description: String,
        retryable: bool,
    },

    #[error("Razorpay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Razorpay response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Signature error: {0}")]
    Signature(#[from] anyhow::Error),
}

impl GatewayError {
    /// Transport failures and provider 5xx responses are safe to retry on
    /// the order-creation path; everything else is not.
    fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Transport(_) => true,
            GatewayError::Api { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// Abstraction over waiting, so retry backoff is testable with a fake clock.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded exponential backoff for gateway order creation.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts, initial call included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): doubles each time.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(retry)
    }
}

/// Razorpay client for interacting with the Razorpay API.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

/// Request to create a Razorpay order.
#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    /// Amount in smallest currency unit (paise for INR).
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a BTreeMap<String, String>>,
}

/// Gateway-side order, as returned by the Orders API.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
    pub created_at: i64,
}

/// Gateway-side payment entity.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub order_id: Option<String>,
    pub method: Option<String>,
    pub fee: Option<i64>,
    pub tax: Option<i64>,
    pub captured: Option<bool>,
}

/// Gateway-side refund entity.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

/// Gateway-side subscription entity carried on webhook events.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: String,
    /// End of the current billing period, as a unix timestamp.
    pub current_end: Option<i64>,
}

/// Razorpay API error response.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: String,
    description: String,
}

/// Webhook event envelope.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub entity: String,
    pub event: String,
    pub payload: WebhookPayload,
    pub created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<Wrapped<GatewayPayment>>,
    pub refund: Option<Wrapped<GatewayRefund>>,
    pub subscription: Option<Wrapped<GatewaySubscription>>,
}

#[derive(Debug, Deserialize)]
pub struct Wrapped<T> {
    pub entity: T,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig, retry: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client: Client::new(),
            config,
            retry,
            sleeper,
        }
    }

    /// Check if Razorpay is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    /// Create a gateway order, retrying transient failures with exponential
    /// backoff up to the policy's attempt bound.
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: Option<&BTreeMap<String, String>>,
    ) -> Result<GatewayOrder, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::Unconfigured);
        }

        let mut attempt: u32 = 0;
        loop {
            match self
                .try_create_order(amount, currency, receipt, notes)
                .await
            {
                Ok(order) => {
                    tracing::info!(
                        order_id = %order.id,
                        amount = order.amount,
                        currency = %order.currency,
                        attempt = attempt + 1,
                        "Razorpay order created"
                    );
                    return Ok(order);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts || !e.is_retryable() {
                        tracing::error!(
                            error = %e,
                            attempts = attempt,
                            "Razorpay order creation failed"
                        );
                        return Err(e);
                    }
                    let backoff = self.retry.backoff_for(attempt - 1);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Razorpay order creation failed, retrying"
                    );
                    self.sleeper.sleep(backoff).await;
                }
            }
        }
    }

    async fn try_create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: Option<&BTreeMap<String, String>>,
    ) -> Result<GatewayOrder, GatewayError> {
        let request = CreateOrderRequest {
            amount,
            currency,
            receipt,
            notes,
        };

        let url = format!("{}/orders", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Fetch a payment's live status.
    pub async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::Unconfigured);
        }

        let url = format!("{}/payments/{}", self.config.api_base_url, payment_id);
        let response = self
            .client
            .get(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Explicitly capture an authorized payment. Never retried.
    pub async fn capture_payment(
        &self,
        payment_id: &str,
        amount: i64,
        currency: &str,
    ) -> Result<GatewayPayment, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::Unconfigured);
        }

        let url = format!(
            "{}/payments/{}/capture",
            self.config.api_base_url, payment_id
        );
        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&serde_json::json!({ "amount": amount, "currency": currency }))
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Issue a refund against a captured payment. Never retried.
    pub async fn create_refund(
        &self,
        payment_id: &str,
        amount: i64,
        notes: Option<&BTreeMap<String, String>>,
    ) -> Result<GatewayRefund, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::Unconfigured);
        }

        let url = format!("{}/payments/{}/refund", self.config.api_base_url, payment_id);
        let mut body = serde_json::json!({ "amount": amount });
        if let Some(notes) = notes {
            body["notes"] = serde_json::to_value(notes)?;
        }

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&body)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Verify the checkout capture signature:
    /// `HMAC-SHA256("{order_id}|{payment_id}", webhook_secret)`.
    pub fn verify_capture_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        provided: &str,
    ) -> Result<bool, GatewayError> {
        let payload = format!("{}|{}", gateway_order_id, gateway_payment_id);
        let valid = signature::verify_signature(
            self.config.webhook_secret.expose_secret(),
            &payload,
            provided,
        )?;

        if !valid {
            tracing::warn!(
                order_id = %gateway_order_id,
                payment_id = %gateway_payment_id,
                "Payment signature verification failed"
            );
        }

        Ok(valid)
    }

    /// Verify a webhook signature over the raw request body.
    pub fn verify_webhook_signature(
        &self,
        body: &str,
        provided: &str,
    ) -> Result<bool, GatewayError> {
        let valid = signature::verify_signature(
            self.config.webhook_secret.expose_secret(),
            body,
            provided,
        )?;

        if !valid {
            tracing::warn!("Webhook signature verification failed");
        }

        Ok(valid)
    }

    /// Parse a webhook event from the raw request body.
    pub fn parse_webhook_event(&self, body: &str) -> Result<WebhookEvent, GatewayError> {
        Ok(serde_json::from_str(body)?)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, body = %body, "Razorpay response");

        if status.is_success() {
            Ok(serde_json::from_str(&body)?)
        } else {
            let error: ApiErrorBody = serde_json::from_str(&body).unwrap_or(ApiErrorBody {
                error: ApiErrorDetail {
                    code: "UNKNOWN".to_string(),
                    description: body,
                },
            });
            Err(GatewayError::Api {
                code: error.error.code,
                description: error.error.description,
                retryable: status.is_server_error(),
            })
        }
    }
}
