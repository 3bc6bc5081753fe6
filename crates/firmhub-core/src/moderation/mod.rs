//! Content moderation for firm listings.

pub mod profanity;

pub use profanity::ProfanityFilter;
