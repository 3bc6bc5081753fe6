//! Application state and sub-state extractors.
//!
//! AppState is split into domain sub-states so handlers can extract only what they need
//! via Axum's `FromRef`.

use crate::auth::AuthState;
use crate::consumers::email::EmailDispatcher;
use crate::notifications::NotificationHub;
use firmhub_core::moderation::ProfanityFilter;
use firmhub_core::{Config, Language};
use firmhub_db::{
    AnswerRepository, FirmRepository, MediaRepository, MessageRepository, QuestionRepository,
    RefreshTokenRepository, SubscriptionRepository, TaxonomyRepository, UserRepository,
};
use firmhub_services::VirusScanner;
use firmhub_storage::Storage;
use firmhub_worker::MessageQueue;
use sqlx::PgPool;
use std::sync::Arc;

#[cfg(feature = "stripe")]
use firmhub_services::StripeClient;

// ----- Sub-state types -----

/// Database pool and every repository.
#[derive(Clone)]
pub struct DbState {
    pub pool: PgPool,
    pub users: UserRepository,
    pub refresh_tokens: RefreshTokenRepository,
    pub taxonomy: TaxonomyRepository,
    pub questions: QuestionRepository,
    pub answers: AnswerRepository,
    pub firms: FirmRepository,
    pub subscriptions: SubscriptionRepository,
    pub messages: MessageRepository,
}

impl DbState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            refresh_tokens: RefreshTokenRepository::new(pool.clone()),
            taxonomy: TaxonomyRepository::new(pool.clone()),
            questions: QuestionRepository::new(pool.clone()),
            answers: AnswerRepository::new(pool.clone()),
            firms: FirmRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Media repository, object storage, scanner and upload allowlists.
#[derive(Clone)]
pub struct MediaConfig {
    pub repository: MediaRepository,
    pub storage: Arc<dyn Storage>,
    pub scanner: Arc<dyn VirusScanner>,
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
}

/// Stripe client and checkout settings. `stripe` is `None` when billing is disabled.
#[derive(Clone)]
pub struct BillingState {
    #[cfg(feature = "stripe")]
    pub stripe: Option<StripeClient>,
    pub webhook_secret: Option<String>,
    pub frontend_url: Option<String>,
}

impl BillingState {
    pub fn enabled(&self) -> bool {
        #[cfg(feature = "stripe")]
        {
            self.stripe.is_some() && self.webhook_secret.is_some()
        }
        #[cfg(not(feature = "stripe"))]
        {
            false
        }
    }
}

/// Queue publisher, outgoing email and push notifications.
#[derive(Clone)]
pub struct MessagingState {
    pub queue: MessageQueue,
    pub email: EmailDispatcher,
    pub notifications: NotificationHub,
}

/// Token lifetimes and admin bootstrap list used by the account service.
#[derive(Clone)]
pub struct AccountSettings {
    pub refresh_ttl_days: i64,
    pub revocation_ttl_days: u64,
    pub admin_emails: Vec<String>,
}

// ----- AppState -----

#[derive(Clone)]
pub struct AppState {
    pub db: DbState,
    pub media: MediaConfig,
    pub auth: Arc<AuthState>,
    pub accounts: AccountSettings,
    pub billing: BillingState,
    pub messaging: MessagingState,
    pub moderation: Arc<ProfanityFilter>,
    pub config: Config,
    pub default_language: Language,
    pub is_production: bool,
}

// ----- FromRef for sub-state extraction -----

impl axum::extract::FromRef<Arc<AppState>> for DbState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for MediaConfig {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.media.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for BillingState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.billing.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for MessagingState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.messaging.clone()
    }
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
