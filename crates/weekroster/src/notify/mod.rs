//! Promotion notices.
//!
//! When a waitlisted player is promoted, the service resolves the
//! [`PromotionEvent`] into a [`PromotionNotice`] and hands it to a
//! [`Notifier`]. Delivery is best effort: failures are reported to the
//! caller but never undo the promotion.

pub mod smtp;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{Config, EventConfig};
use crate::error::Result;
use crate::roster::{Category, PlayerId, PromotionEvent, RosterSnapshot};
use crate::week::WeekKey;

pub use smtp::SmtpNotifier;

/// Everything needed to tell a player they were promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionNotice {
    /// Promoted player.
    pub player: PlayerId,
    /// Display name.
    pub name: String,
    /// Contact address, if the player has one.
    pub email: Option<String>,
    /// Week of the promotion.
    pub week: WeekKey,
    /// Category the player was promoted in.
    pub category: Category,
}

impl PromotionNotice {
    /// Resolve an event against the player records.
    #[must_use]
    pub fn resolve(event: &PromotionEvent, roster: &RosterSnapshot) -> Self {
        let info = roster.players.get(&event.player);
        Self {
            player: event.player.clone(),
            name: roster.display_name(&event.player).to_string(),
            email: info.and_then(|p| p.contact()).map(str::to_string),
            week: event.week,
            category: event.category,
        }
    }
}

/// A rendered promotion email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl PromotionMessage {
    /// Render the notice. Returns `None` when the player has no address.
    #[must_use]
    pub fn compose(notice: &PromotionNotice, event: &EventConfig) -> Option<Self> {
        let to = notice.email.clone()?;
        let week = notice.week.label();
        let subject = format!(
            "{} - You've been promoted from the waitlist for {week}",
            event.title
        );
        let body = format!(
            "Hi {name},\n\n\
             This is an automated email. You've been promoted from the waitlist and are now \
             signed up as {category} for {title}, {week}. If you can no longer attend, please \
             remove your signup so that the next player on the waitlist can be promoted.\n\n\
             {signature}\n",
            name = notice.name,
            category = notice.category,
            title = event.title,
            signature = event.signature,
        );
        Some(Self { to, subject, body })
    }
}

/// Outcome of a notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The notice was handed to the mail relay.
    Sent,
    /// Nothing was sent: notices are disabled or the player has no address.
    Skipped,
}

/// Sends promotion notices.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Deliver one notice.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotificationDeliveryFailed`] if the channel
    /// rejects the message.
    async fn notify(&self, notice: &PromotionNotice) -> Result<Delivery>;
}

#[async_trait]
impl Notifier for Box<dyn Notifier> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn notify(&self, notice: &PromotionNotice) -> Result<Delivery> {
        (**self).notify(notice).await
    }
}

/// Notifier used when email is turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn notify(&self, notice: &PromotionNotice) -> Result<Delivery> {
        debug!(
            player = %notice.player,
            week = %notice.week,
            "Email disabled, not sending promotion notice"
        );
        Ok(Delivery::Skipped)
    }
}

/// Build the notifier selected by the `[email]` section.
///
/// # Errors
///
/// Returns an error if email is active but the sender address or relay host
/// is malformed.
pub fn notifier_from_config(config: &Config) -> Result<Box<dyn Notifier>> {
    if config.email.is_active() {
        return Ok(Box::new(SmtpNotifier::new(&config.email, config.event.clone())?));
    }
    if config.email.enabled {
        warn!("email.enabled is set but email.sender_email is empty; promotion notices are off");
    }
    Ok(Box::new(DisabledNotifier))
}

#[cfg(test)]
pub(crate) mod testing {
    //! A notifier that records what it was asked to send.

    use std::sync::Mutex;

    use super::{async_trait, Delivery, Notifier, PromotionNotice, Result};
    use crate::Error;

    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<PromotionNotice>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn notices(&self) -> Vec<PromotionNotice> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, notice: &PromotionNotice) -> Result<Delivery> {
            self.sent.lock().unwrap().push(notice.clone());
            if self.fail {
                return Err(Error::delivery_failed(
                    notice.email.clone().unwrap_or_default(),
                    "relay refused",
                ));
            }
            Ok(Delivery::Sent)
        }
    }

    #[async_trait]
    impl<T: Notifier> Notifier for std::sync::Arc<T> {
        fn name(&self) -> &'static str {
            (**self).name()
        }

        async fn notify(&self, notice: &PromotionNotice) -> Result<Delivery> {
            (**self).notify(notice).await
        }
    }
}
