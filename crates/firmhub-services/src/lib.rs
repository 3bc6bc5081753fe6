//! Firmhub Services Layer
//!
//! Clients for the external collaborators of the marketplace: the ClamAV daemon, the Redis
//! token store, Stripe and the SMTP relay. Each client owns its wire protocol and error
//! type; orchestration stays in firmhub-api.

pub mod services;

#[cfg(feature = "clamav")]
pub use services::clamav::ClamAvScanner;
pub use services::clamav::{DisabledScanner, ScanError, ScanVerdict, VirusScanner};
#[cfg(feature = "email")]
pub use services::email::{MailError, SmtpMailer};
#[cfg(feature = "stripe")]
pub use services::stripe::{CheckoutSession, StripeClient};
pub use services::stripe::{
    verify_webhook_signature, StripeCheckoutSession, StripeError, StripeEvent, StripeInvoice,
    StripeSubscription,
};
#[cfg(feature = "redis")]
pub use services::token_store::RedisTokenStore;
pub use services::token_store::{InMemoryTokenStore, TokenStore, TokenStoreError};
