pub mod access;
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use mealpay_core::middleware::tracing::request_id_middleware;
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use config::Config;
use services::razorpay::{RetryPolicy, TokioSleeper};
use services::{Database, PaymentOrchestrator, RazorpayClient, RedisCache};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub database: Database,
}

pub struct Application {
    port: u16,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let database = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        database.run_migrations().await?;

        let redis = redis::Client::open(config.redis.url.expose_secret().as_str())?;
        let cache = RedisCache::new(redis);

        let retry = RetryPolicy {
            max_attempts: config.rules.gateway_max_attempts,
            initial_backoff: Duration::from_millis(config.rules.gateway_initial_backoff_ms),
        };
        let razorpay = RazorpayClient::new(config.razorpay.clone(), retry, Arc::new(TokioSleeper));
        if razorpay.is_configured() {
            tracing::info!("Razorpay client initialized");
        } else {
            tracing::warn!(
                "Razorpay credentials not configured - payment features will be limited"
            );
        }

        let orchestrator = Arc::new(PaymentOrchestrator::new(
            Arc::new(database.clone()),
            razorpay,
            Arc::new(cache),
            config.rules.clone(),
        ));

        let state = AppState {
            config: config.clone(),
            orchestrator,
            database,
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            .route("/payments/orders", post(handlers::payments::create_payment_order))
            .route("/payments/verify", post(handlers::payments::capture_payment))
            .route("/payments/refunds", post(handlers::payments::create_refund))
            .route("/payments/webhook", post(handlers::webhook::webhook))
            .route("/orders/:id", get(handlers::orders::get_order_detail))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state);

        Ok(Self {
            port: config.server.port,
            router,
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        tracing::info!("Listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
