//! Firmhub Storage Library
//!
//! This crate provides the object storage abstraction used by the media pipeline,
//! with an S3-compatible backend (through `object_store`) and a local filesystem backend.
//!
//! # Storage key format
//!
//! Uploads land in quarantine until the antivirus scan finishes:
//!
//! - **Quarantine**: `temp/{firm_id}/{media_id}.{ext}`
//! - **Published**: `media/{firm_id}/{media_id}.{ext}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use firmhub_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
