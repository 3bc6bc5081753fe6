mod message;
mod subscription;

pub use message::{next_retry_delay, MessageRepository, NEW_MESSAGE_CHANNEL};
pub use subscription::{SubscriptionRepository, SubscriptionSync};
