//! `email.send` consumer.

use firmhub_core::messages::EmailMessage;
use firmhub_worker::ConsumerError;

#[cfg(feature = "email")]
use firmhub_services::{MailError, SmtpMailer};

/// Delivers queued emails over SMTP. Without a mailer, messages are logged and dropped.
#[derive(Clone, Default)]
pub struct EmailDispatcher {
    #[cfg(feature = "email")]
    mailer: Option<SmtpMailer>,
}

impl EmailDispatcher {
    #[cfg(feature = "email")]
    pub fn new(mailer: Option<SmtpMailer>) -> Self {
        Self { mailer }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "email")]
        {
            self.mailer.is_some()
        }
        #[cfg(not(feature = "email"))]
        {
            false
        }
    }

    pub async fn send(&self, email: &EmailMessage) -> Result<(), ConsumerError> {
        #[cfg(feature = "email")]
        if let Some(mailer) = &self.mailer {
            return match mailer.send(email).await {
                Ok(()) => {
                    tracing::info!(subject = %email.subject, "Email delivered");
                    Ok(())
                }
                // A bad address or body fails the same way on every attempt
                Err(e @ (MailError::InvalidAddress(_) | MailError::Build(_))) => {
                    Err(ConsumerError::unrecoverable(e))
                }
                Err(e) => Err(ConsumerError::recoverable(e)),
            };
        }

        tracing::info!(subject = %email.subject, "Email delivery disabled, message dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_dispatcher_completes() {
        let dispatcher = EmailDispatcher::disabled();
        assert!(!dispatcher.is_enabled());
        let email = EmailMessage {
            to: "owner@example.com".to_string(),
            subject: "Hello".to_string(),
            body_text: "Body".to_string(),
            body_html: None,
        };
        assert!(dispatcher.send(&email).await.is_ok());
    }
}
