//! The signup workflow.
//!
//! [`SignupService`] ties a [`RosterStore`], a [`SignupManager`] and a
//! [`Notifier`] together. Every mutating call loads the roster, applies one
//! manager operation, saves, and only then sends any promotion notice, so a
//! failed notice can never lose a promotion.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::notify::{Delivery, Notifier, PromotionNotice};
use crate::roster::{
    Category, EffectiveCounts, Placement, PlayerId, RosterSnapshot, SignupLocation, SignupManager,
    SignupStatus,
};
use crate::store::RosterStore;
use crate::week::{offered_weeks, WeekKey};

/// A completed signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignupReceipt {
    /// Id derived from the entered name.
    pub player: PlayerId,
    /// Week signed up for.
    pub week: WeekKey,
    /// Category signed up for.
    pub category: Category,
    /// Confirmed or waitlisted, and where.
    pub status: SignupStatus,
}

/// What happened to a promotion notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum NoticeOutcome {
    /// Handed to the mail relay.
    Sent,
    /// Notices are off or the player has no address.
    Skipped,
    /// Delivery failed; the promotion stands.
    Failed(String),
}

/// A promotion and its notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionReport {
    /// Who was promoted, and where.
    pub notice: PromotionNotice,
    /// Delivery result.
    pub outcome: NoticeOutcome,
}

/// A completed removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    /// Removed player.
    pub player: PlayerId,
    /// Week removed from.
    pub week: WeekKey,
    /// Category removed from.
    pub category: Category,
    /// Sequence the player was in.
    pub removed_from: Placement,
    /// The waitlist promotion this removal triggered.
    pub promotion: Option<PromotionReport>,
}

/// One category of a week, with names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    /// Category shown.
    pub category: Category,
    /// Confirmed names, in signup order.
    pub confirmed: Vec<String>,
    /// Waitlisted names, in arrival order.
    pub waitlist: Vec<String>,
}

/// A week's roster ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekView {
    /// Week shown.
    pub week: WeekKey,
    /// Human-readable label.
    pub label: String,
    /// Confirmed slots per category.
    pub capacity: usize,
    /// Every category, in display order.
    pub categories: Vec<CategoryView>,
    /// Totals with no-preference players folded into a side.
    pub effective: EffectiveCounts,
}

/// Runs signups and removals against a store.
#[derive(Debug)]
pub struct SignupService<S, N> {
    store: S,
    notifier: N,
    manager: SignupManager,
    weeks_ahead: u32,
}

impl<S: RosterStore, N: Notifier> SignupService<S, N> {
    /// Create a service with the default capacity and signup window.
    #[must_use]
    pub fn new(store: S, notifier: N) -> Self {
        let defaults = Config::default();
        Self {
            store,
            notifier,
            manager: SignupManager::new(defaults.roster.capacity),
            weeks_ahead: defaults.roster.weeks_ahead,
        }
    }

    /// Create a service using the `[roster]` settings.
    #[must_use]
    pub fn from_config(store: S, notifier: N, config: &Config) -> Self {
        Self::new(store, notifier)
            .with_capacity(config.roster.capacity)
            .with_weeks_ahead(config.roster.weeks_ahead)
    }

    /// Override the confirmed-slot capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.manager = SignupManager::new(capacity);
        self
    }

    /// Override how many future weeks are open.
    #[must_use]
    pub fn with_weeks_ahead(mut self, weeks_ahead: u32) -> Self {
        self.weeks_ahead = weeks_ahead;
        self
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Confirmed slots per category.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.manager.capacity()
    }

    /// Weeks open for signups as of `today`.
    #[must_use]
    pub fn offered_weeks(&self, today: NaiveDate) -> Vec<WeekKey> {
        offered_weeks(today, self.weeks_ahead)
    }

    /// Reject weeks outside the signup window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WeekNotOffered`] if `week` is not offered as of `today`.
    pub fn check_offered(&self, week: WeekKey, today: NaiveDate) -> Result<()> {
        if self.offered_weeks(today).contains(&week) {
            Ok(())
        } else {
            Err(Error::WeekNotOffered { week })
        }
    }

    /// Load the roster with the capacity bound applied.
    async fn load(&self) -> Result<RosterSnapshot> {
        let mut roster = self.store.load().await?;
        self.manager.enforce_capacity(&mut roster);
        Ok(roster)
    }

    /// Register the player and sign them up.
    ///
    /// A player holds at most one signup per week, in any category.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPlayer`] for bad details,
    /// [`Error::DuplicateSignup`] if already signed up for the week, or a store
    /// error.
    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        week: WeekKey,
        category: Category,
    ) -> Result<SignupReceipt> {
        let mut roster = self.load().await?;
        let player = PlayerId::from_name(name);
        if let Some(existing) = self.manager.find_signup(&roster, week, &player) {
            return Err(Error::DuplicateSignup {
                player,
                week,
                category: existing.category,
                placement: existing.placement,
            });
        }
        let player = self.manager.register_player(&mut roster, name, email)?;
        let status = self.manager.sign_up(&mut roster, week, category, &player)?;
        self.store.save(&roster).await?;

        Ok(SignupReceipt {
            player,
            week,
            category,
            status,
        })
    }

    /// Remove the named player, promoting and notifying the waitlist head.
    ///
    /// Without a category, the player's signup for the week is located first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] / [`Error::NotSignedUp`] if there is nothing
    /// to remove, or a store error. Notice failures are reported in the
    /// [`RemovalReport`], not as errors.
    pub async fn remove(
        &self,
        name: &str,
        week: WeekKey,
        category: Option<Category>,
    ) -> Result<RemovalReport> {
        let player = PlayerId::from_name(name);
        let mut roster = self.load().await?;

        let category = match category {
            Some(category) => category,
            None => self
                .manager
                .find_signup(&roster, week, &player)
                .map(|location| location.category)
                .ok_or_else(|| Error::NotSignedUp {
                    player: player.clone(),
                    week,
                })?,
        };

        let outcome = self
            .manager
            .remove_signup(&mut roster, week, category, &player)?;
        self.store.save(&roster).await?;

        let promotion = match outcome.promotion {
            Some(event) => {
                let notice = PromotionNotice::resolve(&event, &roster);
                let outcome = self.deliver(&notice).await;
                Some(PromotionReport { notice, outcome })
            }
            None => None,
        };

        Ok(RemovalReport {
            player,
            week,
            category,
            removed_from: outcome.removed_from,
            promotion,
        })
    }

    async fn deliver(&self, notice: &PromotionNotice) -> NoticeOutcome {
        match self.notifier.notify(notice).await {
            Ok(Delivery::Sent) => NoticeOutcome::Sent,
            Ok(Delivery::Skipped) => NoticeOutcome::Skipped,
            Err(e) => {
                warn!(
                    player = %notice.player,
                    week = %notice.week,
                    notifier = self.notifier.name(),
                    "Promotion stands but the notice was not delivered: {e}"
                );
                NoticeOutcome::Failed(e.to_string())
            }
        }
    }

    /// The roster for a week, names resolved.
    ///
    /// # Errors
    ///
    /// Returns a store error if the roster cannot be loaded.
    pub async fn roster(&self, week: WeekKey) -> Result<WeekView> {
        let roster = self.load().await?;
        Ok(self.view(&roster, week))
    }

    /// Rosters for several weeks from a single load.
    ///
    /// # Errors
    ///
    /// Returns a store error if the roster cannot be loaded.
    pub async fn rosters(&self, weeks: &[WeekKey]) -> Result<Vec<WeekView>> {
        let roster = self.load().await?;
        Ok(weeks.iter().map(|week| self.view(&roster, *week)).collect())
    }

    fn view(&self, roster: &RosterSnapshot, week: WeekKey) -> WeekView {
        let bucket = self.manager.list_week(roster, week);
        let names = |ids: &[PlayerId]| {
            ids.iter()
                .map(|id| roster.display_name(id).to_string())
                .collect()
        };
        let categories = Category::ALL
            .iter()
            .map(|category| {
                let lists = bucket.get(*category);
                CategoryView {
                    category: *category,
                    confirmed: names(&lists.confirmed),
                    waitlist: names(&lists.waitlist),
                }
            })
            .collect();

        WeekView {
            week,
            label: week.label(),
            capacity: self.manager.capacity(),
            categories,
            effective: self.manager.effective_counts(roster, week),
        }
    }

    /// Where the named player sits in a week, if anywhere.
    ///
    /// # Errors
    ///
    /// Returns a store error if the roster cannot be loaded.
    pub async fn status(&self, name: &str, week: WeekKey) -> Result<Option<SignupLocation>> {
        let roster = self.load().await?;
        Ok(self
            .manager
            .find_signup(&roster, week, &PlayerId::from_name(name)))
    }

    /// Drop every signup and waitlist entry for a week.
    ///
    /// Returns `true` if the week had any entries. No notices are sent.
    ///
    /// # Errors
    ///
    /// Returns a store error if the roster cannot be loaded or saved.
    pub async fn clear_week(&self, week: WeekKey) -> Result<bool> {
        let mut roster = self.load().await?;
        let cleared = roster.clear_week(week);
        if cleared {
            self.store.save(&roster).await?;
            info!("Cleared the roster for {}", week);
        }
        Ok(cleared)
    }

    /// Drop every week before `week`. Returns how many weeks were removed.
    ///
    /// # Errors
    ///
    /// Returns a store error if the roster cannot be loaded or saved.
    pub async fn prune_before(&self, week: WeekKey) -> Result<usize> {
        let mut roster = self.load().await?;
        let pruned = roster.prune_before(week);
        if pruned > 0 {
            self.store.save(&roster).await?;
            info!("Pruned {} weeks before {}", pruned, week);
        }
        Ok(pruned)
    }
}
