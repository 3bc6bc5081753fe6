//! Firmhub Worker
//!
//! Consumes the Postgres `messages` queue. The API implements [`MessageHandlerContext`]
//! for its state and hands a weak reference to [`MessageQueue::start`].

pub mod context;
pub mod queue;

pub use context::{decode_payload, empty_context_weak, ConsumerError, MessageHandlerContext};
pub use queue::{MessageQueue, MessageQueueConfig};
