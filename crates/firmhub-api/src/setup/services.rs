//! Service initialization and application state setup

use crate::auth::jwt::JwtService;
use crate::auth::middleware::{AuthFailureLimiter, AuthState};
use crate::constants::{AUTH_FAILURE_LIMIT, AUTH_FAILURE_WINDOW_SECS};
use crate::consumers::email::EmailDispatcher;
use crate::notifications::NotificationHub;
use crate::state::{
    AccountSettings, AppState, BillingState, DbState, MediaConfig, MessagingState,
};
use anyhow::{Context, Result};
use firmhub_core::moderation::ProfanityFilter;
use firmhub_core::Config;
use firmhub_db::MediaRepository;
use firmhub_services::{DisabledScanner, TokenStore, VirusScanner};
use firmhub_worker::{MessageQueue, MessageQueueConfig};
use sqlx::PgPool;
use std::sync::Arc;

#[cfg(feature = "clamav")]
use firmhub_services::ClamAvScanner;
#[cfg(not(feature = "redis"))]
use firmhub_services::InMemoryTokenStore;
#[cfg(feature = "redis")]
use firmhub_services::RedisTokenStore;
#[cfg(feature = "email")]
use firmhub_services::SmtpMailer;
#[cfg(feature = "stripe")]
use firmhub_services::StripeClient;

/// Initialize every client and repository and assemble the application state.
pub async fn initialize_services(config: &Config, pool: PgPool) -> Result<Arc<AppState>> {
    let storage = firmhub_storage::create_storage(config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(backend = ?config.storage_backend(), "Storage initialized");

    let scanner = setup_scanner(config);
    let token_store = setup_token_store(config).await?;
    let billing = setup_billing(config)?;
    let email = setup_email(config);

    let auth = Arc::new(AuthState {
        jwt: JwtService::new(
            config.jwt_secret(),
            config.jwt_issuer(),
            config.access_token_ttl_minutes(),
        ),
        token_store,
        failure_limiter: Some(Arc::new(AuthFailureLimiter::new(
            AUTH_FAILURE_LIMIT,
            AUTH_FAILURE_WINDOW_SECS,
        ))),
    });

    let moderation = Arc::new(ProfanityFilter::new(config.profanity_extra_terms()));
    let db = DbState::new(pool.clone());

    // Workers are attached in `initialize_app` once the state exists.
    let queue = MessageQueue::publisher_only(
        db.messages.clone(),
        MessageQueueConfig::from_config(config),
    );

    let state = AppState {
        media: MediaConfig {
            repository: MediaRepository::new(pool),
            storage,
            scanner,
            max_file_size: config.max_upload_size_bytes(),
            allowed_extensions: config.allowed_upload_extensions().to_vec(),
            allowed_content_types: config.allowed_upload_content_types().to_vec(),
        },
        db,
        auth,
        accounts: AccountSettings {
            refresh_ttl_days: config.refresh_token_ttl_days(),
            revocation_ttl_days: config.revocation_ttl_days(),
            admin_emails: config.admin_emails().to_vec(),
        },
        billing,
        messaging: MessagingState {
            queue,
            email,
            notifications: NotificationHub::new(),
        },
        moderation,
        default_language: config.default_language(),
        is_production: config.is_production(),
        config: config.clone(),
    };

    Ok(Arc::new(state))
}

fn setup_scanner(config: &Config) -> Arc<dyn VirusScanner> {
    #[cfg(feature = "clamav")]
    if config.clamav_enabled() {
        tracing::info!(
            host = %config.clamav_host(),
            port = config.clamav_port(),
            fail_closed = config.clamav_fail_closed(),
            "ClamAV scanning enabled"
        );
        return Arc::new(ClamAvScanner::new(
            config.clamav_host(),
            config.clamav_port(),
            config.clamav_fail_closed(),
        ));
    }

    if config.is_production() {
        tracing::warn!("Virus scanning disabled in production; uploads are published unscanned");
    } else {
        tracing::info!("Virus scanning disabled");
    }
    Arc::new(DisabledScanner)
}

async fn setup_token_store(config: &Config) -> Result<Arc<dyn TokenStore>> {
    #[cfg(feature = "redis")]
    {
        let store = RedisTokenStore::connect(config.redis_url())
            .await
            .context("Failed to connect to Redis token store")?;
        tracing::info!("Redis token store connected");
        Ok(Arc::new(store))
    }
    #[cfg(not(feature = "redis"))]
    {
        if config.is_production() {
            anyhow::bail!("Built without the redis feature; an in-memory token store is not allowed in production");
        }
        tracing::warn!("Using in-memory token store; revocations are lost on restart");
        Ok(Arc::new(InMemoryTokenStore::new()))
    }
}

fn setup_billing(config: &Config) -> Result<BillingState> {
    let webhook_secret = config.stripe_webhook_secret().map(str::to_string);
    let frontend_url = config.frontend_url().map(str::to_string);

    #[cfg(feature = "stripe")]
    {
        let stripe = match (config.billing_enabled(), config.stripe_secret_key()) {
            (true, Some(key)) => {
                let client = StripeClient::new(key, config.stripe_api_base())
                    .context("Failed to build Stripe client")?;
                tracing::info!(api_base = %config.stripe_api_base(), "Stripe billing enabled");
                Some(client)
            }
            (true, None) => {
                tracing::warn!("BILLING_ENABLED is set but STRIPE_SECRET_KEY is missing; billing disabled");
                None
            }
            (false, _) => {
                tracing::info!("Billing disabled");
                None
            }
        };
        Ok(BillingState {
            stripe,
            webhook_secret,
            frontend_url,
        })
    }
    #[cfg(not(feature = "stripe"))]
    {
        if config.billing_enabled() {
            tracing::warn!("BILLING_ENABLED is set but the stripe feature is not compiled in");
        }
        Ok(BillingState {
            webhook_secret,
            frontend_url,
        })
    }
}

fn setup_email(config: &Config) -> EmailDispatcher {
    #[cfg(feature = "email")]
    {
        let mailer = SmtpMailer::from_config(config);
        if mailer.is_some() {
            tracing::info!(host = ?config.smtp_host(), "SMTP delivery enabled");
        }
        EmailDispatcher::new(mailer)
    }
    #[cfg(not(feature = "email"))]
    {
        let _ = config;
        EmailDispatcher::disabled()
    }
}
