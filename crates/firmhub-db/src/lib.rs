//! Firmhub Database Layer
//!
//! This crate provides the Postgres repositories behind the marketplace: accounts and
//! refresh tokens, taxonomy, questionnaires and answers, firms, media, billing and the
//! background message queue.
//!
// Module declarations
pub mod db;

// Re-exports: account repositories
pub use db::{RefreshTokenRepository, Rotation, UserRepository};

// Re-exports: marketplace repositories
pub use db::{
    AnswerRepository, FirmRepository, MediaRepository, NewMedia, QuestionRepository,
    TaxonomyRepository,
};

// Re-exports: billing and queue
pub use db::{
    next_retry_delay, MessageRepository, SubscriptionRepository, SubscriptionSync,
    NEW_MESSAGE_CHANNEL,
};

// Re-exports: Transaction utilities
pub use db::transaction::TransactionGuard;
