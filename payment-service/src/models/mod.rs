pub mod caller;
pub mod order;
pub mod payment_order;
pub mod refund;
pub mod subscription;
pub mod transaction;

pub use caller::{Caller, Role};
pub use order::{Order, OrderItem, OrderMetadata, OrderPaymentStatus, OrderStatus, TrackingEvent};
pub use payment_order::{PaymentMetadata, PaymentOrder, PaymentOrderStatus, PaymentTarget};
pub use refund::{PaymentRefund, RefundStatus};
pub use subscription::{Subscription, SubscriptionStatus};
pub use transaction::{PaymentTransaction, TransactionStatus};
