//! Stripe integration: REST client for checkout and subscriptions, webhook signature
//! verification and the event payloads the marketplace consumes.

#[cfg(feature = "stripe")]
mod client;
mod events;
mod webhook;

#[cfg(feature = "stripe")]
pub use client::{CheckoutSession, StripeClient};
pub use events::{
    StripeCheckoutSession, StripeEvent, StripeInvoice, StripeSubscription, EVENT_CHECKOUT_COMPLETED,
    EVENT_INVOICE_PAID, EVENT_INVOICE_PAYMENT_FAILED, EVENT_SUBSCRIPTION_CREATED,
    EVENT_SUBSCRIPTION_DELETED, EVENT_SUBSCRIPTION_UPDATED,
};
pub use webhook::verify_webhook_signature;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("Stripe request failed: {0}")]
    Transport(String),

    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected Stripe payload: {0}")]
    Payload(String),

    #[error("Missing Stripe-Signature header")]
    MissingSignature,

    #[error("Invalid Stripe-Signature header")]
    MalformedSignature,

    #[error("Webhook signature mismatch")]
    SignatureMismatch,

    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,
}

impl From<StripeError> for firmhub_core::AppError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::MissingSignature
            | StripeError::MalformedSignature
            | StripeError::SignatureMismatch
            | StripeError::TimestampOutOfTolerance => {
                firmhub_core::AppError::BadRequest(format!("Rejected webhook: {}", err))
            }
            other => firmhub_core::AppError::StripeError(other.to_string()),
        }
    }
}
