use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static PAYMENT_ORDERS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "payment_orders_total",
            "Payment orders created, by target kind and outcome",
        ),
        &["target", "outcome"],
    )
    .expect("Failed to create payment_orders_total metric");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register payment_orders_total");
    counter
});

pub static CAPTURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("payment_captures_total", "Capture attempts by outcome"),
        &["outcome"],
    )
    .expect("Failed to create payment_captures_total metric");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register payment_captures_total");
    counter
});

pub static WEBHOOK_EVENTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("webhook_events_total", "Gateway webhook events by type"),
        &["event"],
    )
    .expect("Failed to create webhook_events_total metric");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register webhook_events_total");
    counter
});

pub static DB_QUERY_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new("db_query_duration_seconds", "Database query duration"),
        &["query"],
    )
    .expect("Failed to create db_query_duration_seconds metric");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("Failed to register db_query_duration_seconds");
    histogram
});

/// Render all registered metrics in the Prometheus text format.
pub fn get_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).ok();
    String::from_utf8(buffer).unwrap_or_default()
}
