//! SMTP delivery over STARTTLS.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::{Delivery, Notifier, PromotionMessage, PromotionNotice};
use crate::config::{EmailConfig, EventConfig};
use crate::error::{Error, Result};

/// Connect/command timeout for the relay.
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends promotion notices through an authenticated SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    event: EventConfig,
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("sender", &self.sender.to_string())
            .field("event", &self.event.title)
            .finish_non_exhaustive()
    }
}

impl SmtpNotifier {
    /// Build a notifier from the `[email]` section.
    ///
    /// No connection is made until the first notice is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if the sender address or relay
    /// host is malformed.
    pub fn new(email: &EmailConfig, event: EventConfig) -> Result<Self> {
        let sender: Mailbox = email
            .sender_email
            .trim()
            .parse()
            .map_err(|e| Error::ConfigValidation {
                message: format!("email.sender_email is not a valid address: {e}"),
            })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&email.smtp_server)
            .map_err(|e| Error::ConfigValidation {
                message: format!("email.smtp_server '{}': {e}", email.smtp_server),
            })?
            .port(email.smtp_port)
            .credentials(Credentials::new(
                email.sender_email.trim().to_string(),
                email.sender_password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            sender,
            event,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn notify(&self, notice: &PromotionNotice) -> Result<Delivery> {
        let Some(message) = PromotionMessage::compose(notice, &self.event) else {
            debug!(player = %notice.player, "No contact address, skipping promotion notice");
            return Ok(Delivery::Skipped);
        };

        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| Error::delivery_failed(&message.to, format!("bad address: {e}")))?;
        let email = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| Error::delivery_failed(&message.to, e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| Error::delivery_failed(&message.to, e.to_string()))?;

        info!(player = %notice.player, week = %notice.week, "Sent promotion notice to {}", message.to);
        Ok(Delivery::Sent)
    }
}
