use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub razorpay: RazorpayConfig,
    pub rules: PaymentRules,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
}

/// Business rules for payment-order creation.
#[derive(Deserialize, Clone, Debug)]
pub struct PaymentRules {
    /// The single currency this deployment accepts (ISO 4217).
    pub currency: String,
    /// Upper bound on a single payment order, in minor units (paise).
    pub amount_ceiling_minor: i64,
    /// Cap on serialized request metadata, in bytes.
    pub metadata_max_bytes: usize,
    /// Cap on the number of note key/value pairs forwarded to the gateway.
    pub notes_max_entries: usize,
    /// Window within which a created payment order must be captured.
    pub expiry_hours: i64,
    /// Gateway order-creation attempts (initial call included).
    pub gateway_max_attempts: u32,
    /// Initial backoff before the first gateway retry, in milliseconds.
    pub gateway_initial_backoff_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("PAYMENT_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PAYMENT_SERVICE_PORT")
            .unwrap_or_else(|_| "3003".to_string())
            .parse()?;

        let db_url = env::var("PAYMENT_DATABASE_URL").expect("PAYMENT_DATABASE_URL must be set");
        let max_connections = env::var("PAYMENT_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("PAYMENT_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let redis_url =
            env::var("PAYMENT_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let key_id = env::var("RAZORPAY_KEY_ID").unwrap_or_default();
        let key_secret = env::var("RAZORPAY_KEY_SECRET").unwrap_or_default();
        let webhook_secret = env::var("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default();
        let api_base_url = env::var("RAZORPAY_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string());

        let amount_ceiling_minor = env::var("PAYMENT_AMOUNT_CEILING_MINOR")
            .unwrap_or_else(|_| "100000000".to_string()) // Rs 10,00,000
            .parse()?;
        let currency = env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "INR".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            redis: RedisConfig {
                url: Secret::new(redis_url),
            },
            razorpay: RazorpayConfig {
                key_id,
                key_secret: Secret::new(key_secret),
                webhook_secret: Secret::new(webhook_secret),
                api_base_url,
            },
            rules: PaymentRules {
                currency,
                amount_ceiling_minor,
                metadata_max_bytes: 4096,
                notes_max_entries: 15,
                expiry_hours: 24,
                gateway_max_attempts: 3,
                gateway_initial_backoff_ms: 200,
            },
            service_name: "mealpay-payment".to_string(),
        })
    }
}

impl Default for PaymentRules {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            amount_ceiling_minor: 100_000_000,
            metadata_max_bytes: 4096,
            notes_max_entries: 15,
            expiry_hours: 24,
            gateway_max_attempts: 3,
            gateway_initial_backoff_ms: 200,
        }
    }
}
