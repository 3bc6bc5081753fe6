//! Firmhub API Library
//!
//! This crate provides the HTTP handlers, middleware, services, background consumers and
//! application setup of the marketplace.

// Module declarations
mod api_doc;
pub mod constants;
pub mod consumers;
mod handlers;
pub mod middleware;
mod services;
pub mod setup;
mod utils;

// Public modules
pub mod auth;
pub mod error;
pub mod notifications;
pub mod state;

// Re-exports
pub use error::{HttpAppError, ValidatedJson};
pub use firmhub_worker::{MessageQueue, MessageQueueConfig};
pub use notifications::{Notification, NotificationHub};
