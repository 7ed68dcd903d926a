//! Best-effort cache for payment-order payloads.
//!
//! Cache failures are surfaced as errors here; callers on financial paths
//! log and continue, never failing an operation on a cache miss.

use async_trait::async_trait;
use mealpay_core::error::AppError;

#[async_trait]
pub trait PaymentCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Cache key for a payment order, by its gateway order id.
pub fn payment_order_key(gateway_order_id: &str) -> String {
    format!("payment_order:{}", gateway_order_id)
}

#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get redis connection: {}", e);
                AppError::RedisError(e)
            })
    }
}

#[async_trait]
impl PaymentCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut con = self.connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut con)
            .await
            .map_err(AppError::RedisError)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), AppError> {
        let mut con = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut con)
            .await
            .map_err(AppError::RedisError)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut con = self.connection().await?;
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut con)
            .await
            .map_err(AppError::RedisError)?;
        Ok(())
    }
}
