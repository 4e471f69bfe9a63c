pub mod channel;

// Re-export key types for convenience
pub use channel::{HandlerFuture, NotificationChannel, SubscriptionId};
