//! Database repositories for the data access layer
//!
//! Repositories are organized into account/ (users, refresh tokens), marketplace/
//! (taxonomy, questions, answers, firms, media) and billing/ (subscriptions and the
//! message queue). Each repository owns one aggregate and hides its SQL.
//
// Users and refresh tokens
pub mod account;
//
// Firms, questionnaires and media
pub mod marketplace;
//
// Subscriptions, payments and queued messages
pub mod billing;
//
// Transaction utilities
pub mod transaction;

pub use account::{RefreshTokenRepository, Rotation, UserRepository};
pub use billing::{
    next_retry_delay, MessageRepository, SubscriptionRepository, SubscriptionSync,
    NEW_MESSAGE_CHANNEL,
};
pub use marketplace::{
    AnswerRepository, FirmRepository, MediaRepository, NewMedia, QuestionRepository,
    TaxonomyRepository,
};
