pub mod admin;
pub mod auth;
pub mod billing;
pub mod firms;
pub mod forms;
pub mod media;
pub mod notifications;
pub mod questions;
pub mod taxonomy;
pub mod webhooks;
