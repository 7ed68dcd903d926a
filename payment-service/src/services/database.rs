//! Database service for the payment core.

use crate::models::{
    Order, OrderItem, PaymentOrder, PaymentRefund, PaymentTransaction, Subscription,
    TrackingEvent,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::PaymentStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mealpay_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "mealpay-payment"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for Database {
    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, student_id, school_id, status, payment_status,
                   total_amount, metadata, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get order: {}", e)))?;

        timer.observe_duration();
        Ok(order)
    }

    #[instrument(skip(self), fields(subscription_id = %subscription_id))]
    async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, student_id, subscription_plan_id, plan_name,
                   gateway_subscription_id, status, billing_amount, currency,
                   next_billing_date, created_at, updated_at
            FROM subscriptions
            WHERE id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get subscription: {}", e))
        })?;

        Ok(subscription)
    }

    async fn is_parent_of(&self, parent_id: Uuid, student_id: Uuid) -> Result<bool, AppError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM student_parents WHERE parent_id = $1 AND student_id = $2",
        )
        .bind(parent_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check parent relation: {}", e))
        })?;

        Ok(found > 0)
    }

    #[instrument(
        skip(self, payment_order),
        fields(payment_order_id = %payment_order.id, gateway_order_id = %payment_order.gateway_order_id)
    )]
    async fn create_payment_order(&self, payment_order: &PaymentOrder) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_payment_order"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO payment_orders
                (id, gateway_order_id, amount, currency, status, user_id,
                 order_id, subscription_id, receipt, metadata, expires_at,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            "#,
        )
        .bind(payment_order.id)
        .bind(&payment_order.gateway_order_id)
        .bind(payment_order.amount)
        .bind(&payment_order.currency)
        .bind(payment_order.status.as_str())
        .bind(payment_order.user_id)
        .bind(payment_order.order_id)
        .bind(payment_order.subscription_id)
        .bind(&payment_order.receipt)
        .bind(&payment_order.metadata)
        .bind(payment_order.expires_at)
        .bind(payment_order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert payment order: {}", e))
        })?;

        if let Some(order_id) = payment_order.order_id {
            sqlx::query(
                "UPDATE orders SET payment_status = 'pending', updated_at = now() WHERE id = $1",
            )
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update order: {}", e))
            })?;
        }

        if let Some(subscription_id) = payment_order.subscription_id {
            sqlx::query(
                r#"
                UPDATE subscriptions SET status = 'active', updated_at = now()
                WHERE id = $1 AND status = 'past_due'
                "#,
            )
            .bind(subscription_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update subscription: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit payment order: {}", e))
        })?;

        timer.observe_duration();

        info!(
            payment_order_id = %payment_order.id,
            amount = payment_order.amount,
            "Payment order persisted"
        );

        Ok(())
    }

    async fn find_payment_order_by_gateway_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<PaymentOrder>, AppError> {
        let payment_order = sqlx::query_as::<_, PaymentOrder>(
            r#"
            SELECT id, gateway_order_id, amount, currency, status, user_id,
                   order_id, subscription_id, receipt, metadata, expires_at,
                   created_at, updated_at
            FROM payment_orders
            WHERE gateway_order_id = $1
            "#,
        )
        .bind(gateway_order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find payment order: {}", e))
        })?;

        Ok(payment_order)
    }

    async fn list_payment_orders_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<PaymentOrder>, AppError> {
        let rows = sqlx::query_as::<_, PaymentOrder>(
            r#"
            SELECT id, gateway_order_id, amount, currency, status, user_id,
                   order_id, subscription_id, receipt, metadata, expires_at,
                   created_at, updated_at
            FROM payment_orders
            WHERE order_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list payment orders: {}", e))
        })?;

        Ok(rows)
    }

    async fn find_transaction_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            SELECT id, payment_order_id, gateway_payment_id, method, amount,
                   currency, status, fees, captured_at, created_at
            FROM payment_transactions
            WHERE gateway_payment_id = $1
            "#,
        )
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to find transaction: {}", e))
        })?;

        Ok(transaction)
    }

    async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<PaymentTransaction>, AppError> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            SELECT id, payment_order_id, gateway_payment_id, method, amount,
                   currency, status, fees, captured_at, created_at
            FROM payment_transactions
            WHERE id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get transaction: {}", e))
        })?;

        Ok(transaction)
    }

    #[instrument(
        skip(self, payment_order, transaction),
        fields(payment_order_id = %payment_order.id, gateway_payment_id = %transaction.gateway_payment_id)
    )]
    async fn record_capture(
        &self,
        payment_order: &PaymentOrder,
        transaction: &PaymentTransaction,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_capture"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO payment_transactions
                (id, payment_order_id, gateway_payment_id, method, amount,
                 currency, status, fees, captured_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.payment_order_id)
        .bind(&transaction.gateway_payment_id)
        .bind(&transaction.method)
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(transaction.status.as_str())
        .bind(&transaction.fees)
        .bind(transaction.captured_at)
        .bind(transaction.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert transaction: {}", e))
        })?;

        sqlx::query("UPDATE payment_orders SET status = 'paid', updated_at = now() WHERE id = $1")
            .bind(payment_order.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update payment order: {}", e))
            })?;

        if let Some(order_id) = payment_order.order_id {
            sqlx::query(
                "UPDATE orders SET payment_status = 'paid', updated_at = now() WHERE id = $1",
            )
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update order: {}", e))
            })?;
        }

        if let Some(subscription_id) = payment_order.subscription_id {
            sqlx::query(
                r#"
                UPDATE subscriptions SET status = 'active', updated_at = now()
                WHERE id = $1 AND status = 'past_due'
                "#,
            )
            .bind(subscription_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update subscription: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit capture: {}", e))
        })?;

        timer.observe_duration();

        info!(
            transaction_id = %transaction.id,
            amount = transaction.amount,
            "Capture persisted"
        );

        Ok(())
    }

    async fn insert_refund(&self, refund: &PaymentRefund) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO payment_refunds
                (id, payment_id, gateway_refund_id, amount, currency, status,
                 reason, processed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(refund.id)
        .bind(refund.payment_id)
        .bind(&refund.gateway_refund_id)
        .bind(refund.amount)
        .bind(&refund.currency)
        .bind(refund.status.as_str())
        .bind(&refund.reason)
        .bind(refund.processed_at)
        .bind(refund.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert refund: {}", e)))?;

        Ok(())
    }

    async fn mark_transaction_captured(
        &self,
        gateway_payment_id: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = 'captured', captured_at = $2
            WHERE gateway_payment_id = $1 AND status <> 'captured'
            "#,
        )
        .bind(gateway_payment_id)
        .bind(captured_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark captured: {}", e))
        })?;

        Ok(result.rows_affected())
    }

    async fn mark_transaction_failed(&self, gateway_payment_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = 'failed'
            WHERE gateway_payment_id = $1 AND status <> 'failed'
            "#,
        )
        .bind(gateway_payment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to mark failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn mark_refund_processed(
        &self,
        gateway_refund_id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_refunds
            SET status = 'processed', processed_at = $2
            WHERE gateway_refund_id = $1 AND status = 'pending'
            "#,
        )
        .bind(gateway_refund_id)
        .bind(processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark refund processed: {}", e))
        })?;

        Ok(result.rows_affected())
    }

    async fn reactivate_subscription(
        &self,
        gateway_subscription_id: &str,
        next_billing_date: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'active',
                next_billing_date = COALESCE($2, next_billing_date),
                updated_at = now()
            WHERE gateway_subscription_id = $1
            "#,
        )
        .bind(gateway_subscription_id)
        .bind(next_billing_date)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to reactivate subscription: {}", e))
        })?;

        Ok(result.rows_affected())
    }

    async fn list_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, menu_item_name, quantity, unit_price FROM order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list order items: {}", e))
        })?;

        Ok(items)
    }

    async fn list_order_tracking(&self, order_id: Uuid) -> Result<Vec<TrackingEvent>, AppError> {
        let events = sqlx::query_as::<_, TrackingEvent>(
            r#"
            SELECT id, order_id, status, note, recorded_at
            FROM order_tracking
            WHERE order_id = $1
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list order tracking: {}", e))
        })?;

        Ok(events)
    }
}
