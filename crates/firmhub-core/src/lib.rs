//! Firmhub Core Library
//!
//! This crate provides core domain models, error types, configuration, translation,
//! validation and moderation logic shared across all Firmhub components.

pub mod config;
pub mod constants;
pub mod error;
pub mod i18n;
pub mod messages;
pub mod models;
pub mod moderation;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, FieldError, LogLevel};
pub use i18n::{Language, MessageKey};
pub use storage_types::StorageBackend;
