pub mod cache;
pub mod database;
pub mod metrics;
pub mod orchestrator;
pub mod razorpay;
pub mod store;

pub use cache::{PaymentCache, RedisCache};
pub use database::Database;
pub use metrics::get_metrics;
pub use orchestrator::PaymentOrchestrator;
pub use razorpay::RazorpayClient;
pub use store::PaymentStore;
