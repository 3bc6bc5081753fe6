//! SMTP delivery for queued [`EmailMessage`]s.

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use firmhub_core::messages::EmailMessage;
use firmhub_core::Config;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// One pooled SMTP connection per process. Deliveries wait for the one in flight.
#[derive(Clone, Default)]
struct DeliverySlot(Arc<Mutex<()>>);

impl DeliverySlot {
    async fn run<F: Future>(&self, delivery: F) -> F::Output {
        let _slot = self.0.lock().await;
        delivery.await
    }
}

/// SMTP mailer. `from_config` yields `None` when email is disabled or unconfigured.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    slot: DeliverySlot,
}

impl SmtpMailer {
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.email_enabled() {
            tracing::debug!("Email delivery disabled (EMAIL_ENABLED=false)");
            return None;
        }
        let host = config.smtp_host()?;
        let from: Mailbox = match config.smtp_from()?.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                tracing::warn!(error = %e, "SMTP_FROM is not a valid mailbox, email disabled");
                return None;
            }
        };
        let port = config.smtp_port().unwrap_or(587);
        let credentials = match (config.smtp_user(), config.smtp_password()) {
            (Some(u), Some(p)) => Some(Credentials::new(u.to_string(), p.to_string())),
            _ => None,
        };

        let mailer = if config.smtp_tls() {
            let builder = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host) {
                Ok(b) => b.port(port),
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "Invalid SMTP relay, email disabled");
                    return None;
                }
            };
            let builder = match credentials {
                Some(c) => builder.credentials(c),
                None => builder,
            }
            .pool_config(PoolConfig::new().max_size(1));
            tracing::info!(host = %host, port = port, "Email service initialized (SMTP with STARTTLS)");
            builder.build()
        } else {
            let builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
            let builder = match credentials {
                Some(c) => builder.credentials(c),
                None => builder,
            }
            .pool_config(PoolConfig::new().max_size(1));
            tracing::info!(host = %host, port = port, "Email service initialized (SMTP)");
            builder.build()
        };

        Some(Self {
            mailer: Arc::new(mailer),
            from,
            slot: DeliverySlot::default(),
        })
    }

    /// Build the MIME message; plain text alone or text plus HTML alternative.
    pub fn build_message(&self, email: &EmailMessage) -> Result<Message, MailError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|_| MailError::InvalidAddress(email.to.clone()))?;
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.as_str());

        let message = match &email.body_html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                email.body_text.clone(),
                html.clone(),
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(email.body_text.clone()),
        };
        message.map_err(|e| MailError::Build(e.to_string()))
    }

    pub async fn send(&self, email: &EmailMessage) -> Result<(), MailError> {
        let message = self.build_message(email)?;
        self.slot
            .run(self.mailer.send(message))
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        tracing::info!(subject = %email.subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> SmtpMailer {
        SmtpMailer {
            mailer: Arc::new(
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("localhost").build(),
            ),
            from: "Firmhub <noreply@firmhub.test>".parse().unwrap(),
            slot: DeliverySlot::default(),
        }
    }

    fn email(to: &str, html: Option<&str>) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Your firm was approved".to_string(),
            body_text: "Congratulations".to_string(),
            body_html: html.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_builds_plain_and_html_messages() {
        let m = mailer();
        assert!(m.build_message(&email("owner@firm.test", None)).is_ok());
        let formatted = m
            .build_message(&email("owner@firm.test", Some("<p>Congratulations</p>")))
            .unwrap()
            .formatted();
        let raw = String::from_utf8_lossy(&formatted);
        assert!(raw.contains("multipart/alternative"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected() {
        let result = mailer().build_message(&email("not an address", None));
        assert!(matches!(result, Err(MailError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_deliveries_never_overlap() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        let slot = mailer().slot;
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let deliveries: Vec<_> = (0..8)
            .map(|_| {
                let slot = slot.clone();
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    slot.run(async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                })
            })
            .collect();
        for delivery in deliveries {
            delivery.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
