//! Capacity enforcement and waitlist promotion.
//!
//! For every week and category the confirmed sequence never grows past the
//! capacity, the waitlist is strictly first-in first-out, and a player appears
//! at most once across both sequences.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::player::validate_details;
use super::{
    Category, CategoryLists, CategoryRoster, Placement, PlayerId, PlayerInfo, PromotionEvent,
    RemovalOutcome, RosterSnapshot, SignupLocation, SignupStatus, WeekBucket, DEFAULT_CAPACITY,
};
use crate::error::{Error, Result};
use crate::week::WeekKey;

/// Confirmed counts with no-preference players folded into a gendered side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveCounts {
    /// Man-matching count, including no-preference players if they lean here.
    pub mmp: usize,
    /// Woman-matching count, including no-preference players if they lean here.
    pub wmp: usize,
    /// The side no-preference players are currently counted toward.
    pub no_preference_leans: Category,
}

/// Applies signup and removal rules to a [`RosterSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignupManager {
    capacity: usize,
}

impl Default for SignupManager {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SignupManager {
    /// Create a manager with the given confirmed-slot capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Confirmed slots per category per week.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert or refresh a player record, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPlayer`] if the name or address is rejected.
    pub fn register_player(
        &self,
        roster: &mut RosterSnapshot,
        name: &str,
        email: &str,
    ) -> Result<PlayerId> {
        validate_details(name, email)?;
        let id = PlayerId::from_name(name);
        let name = name.trim().to_string();
        let email = email.trim().to_string();

        roster
            .players
            .entry(id.clone())
            .and_modify(|info| {
                info.name.clone_from(&name);
                info.email = Some(email.clone());
            })
            .or_insert_with(|| PlayerInfo::new(name, email));

        debug!("Registered player {}", id);
        Ok(id)
    }

    /// Sign a player up for a week and category.
    ///
    /// The player takes the next confirmed slot if one is free, otherwise the
    /// tail of the waitlist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateSignup`] if the player is already confirmed or
    /// waitlisted for this week and category.
    pub fn sign_up(
        &self,
        roster: &mut RosterSnapshot,
        week: WeekKey,
        category: Category,
        player: &PlayerId,
    ) -> Result<SignupStatus> {
        let confirmed = roster
            .signups
            .entry(week)
            .or_default()
            .get_mut(category);
        if confirmed.contains(player) {
            return Err(Error::DuplicateSignup {
                player: player.clone(),
                week,
                category,
                placement: Placement::Confirmed,
            });
        }
        let has_room = confirmed.len() < self.capacity;

        let waitlist = roster
            .waitlists
            .entry(week)
            .or_default()
            .get_mut(category);
        if waitlist.contains(player) {
            return Err(Error::DuplicateSignup {
                player: player.clone(),
                week,
                category,
                placement: Placement::Waitlisted,
            });
        }

        let status = if has_room {
            let confirmed = roster
                .signups
                .entry(week)
                .or_default()
                .get_mut(category);
            confirmed.push(player.clone());
            SignupStatus {
                placement: Placement::Confirmed,
                position: confirmed.len(),
            }
        } else {
            waitlist.push(player.clone());
            SignupStatus {
                placement: Placement::Waitlisted,
                position: waitlist.len(),
            }
        };

        info!(
            "{} {} as {} for {} (position {})",
            player, status.placement, category, week, status.position
        );
        Ok(status)
    }

    /// Remove a player's signup, promoting the waitlist head into a vacated slot.
    ///
    /// Nobody is promoted while the confirmed sequence is still at capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the player is in neither sequence.
    pub fn remove_signup(
        &self,
        roster: &mut RosterSnapshot,
        week: WeekKey,
        category: Category,
        player: &PlayerId,
    ) -> Result<RemovalOutcome> {
        let not_found = || Error::NotFound {
            player: player.clone(),
            week,
            category,
        };

        if let Some(confirmed) = roster.signups.get_mut(&week).map(|l| l.get_mut(category)) {
            if let Some(index) = confirmed.iter().position(|p| p == player) {
                confirmed.remove(index);
                let has_room = confirmed.len() < self.capacity;

                let promoted = roster
                    .waitlists
                    .get_mut(&week)
                    .map(|l| l.get_mut(category))
                    .filter(|w| has_room && !w.is_empty())
                    .map(|w| w.remove(0));

                let promotion = promoted.map(|promoted| {
                    roster
                        .signups
                        .entry(week)
                        .or_default()
                        .get_mut(category)
                        .push(promoted.clone());
                    info!("Promoted {} from the {} waitlist for {}", promoted, category, week);
                    PromotionEvent {
                        player: promoted,
                        week,
                        category,
                    }
                });

                info!("Removed {} from {} for {}", player, category, week);
                return Ok(RemovalOutcome {
                    removed_from: Placement::Confirmed,
                    promotion,
                });
            }
        }

        let waitlist = roster
            .waitlists
            .get_mut(&week)
            .map(|l| l.get_mut(category))
            .ok_or_else(not_found)?;
        let index = waitlist
            .iter()
            .position(|p| p == player)
            .ok_or_else(not_found)?;
        waitlist.remove(index);

        info!("Removed {} from the {} waitlist for {}", player, category, week);
        Ok(RemovalOutcome {
            removed_from: Placement::Waitlisted,
            promotion: None,
        })
    }

    /// Move confirmed players past the capacity to the head of the waitlist.
    ///
    /// Stored rosters can hold more than `capacity` confirmed players after
    /// legacy lists are merged or the capacity is lowered. The overflow keeps
    /// its order and goes ahead of everyone already waiting. Returns how many
    /// players were moved.
    pub fn enforce_capacity(&self, roster: &mut RosterSnapshot) -> usize {
        let mut moved = 0;
        for (week, lists) in &mut roster.signups {
            for category in Category::ALL {
                let confirmed = lists.get_mut(category);
                if confirmed.len() <= self.capacity {
                    continue;
                }
                let overflow = confirmed.split_off(self.capacity);
                moved += overflow.len();
                warn!(
                    "{} {} players over capacity for {}, moving them to the waitlist",
                    overflow.len(),
                    category,
                    week
                );
                roster
                    .waitlists
                    .entry(*week)
                    .or_default()
                    .get_mut(category)
                    .splice(0..0, overflow);
            }
        }
        moved
    }

    /// Copy both sequences for a week and category.
    #[must_use]
    pub fn list_signups(
        &self,
        roster: &RosterSnapshot,
        week: WeekKey,
        category: Category,
    ) -> CategoryRoster {
        let pick = |lists: Option<&CategoryLists>| {
            lists.map(|l| l.get(category).clone()).unwrap_or_default()
        };
        CategoryRoster {
            confirmed: pick(roster.signups.get(&week)),
            waitlist: pick(roster.waitlists.get(&week)),
        }
    }

    /// Copy every category for a week.
    #[must_use]
    pub fn list_week(&self, roster: &RosterSnapshot, week: WeekKey) -> WeekBucket {
        WeekBucket {
            week,
            mmp: self.list_signups(roster, week, Category::Mmp),
            wmp: self.list_signups(roster, week, Category::Wmp),
            no_preference: self.list_signups(roster, week, Category::NoPreference),
        }
    }

    /// Find where a player sits in a week, in any category.
    ///
    /// Categories are checked in display order, confirmed before waitlist.
    #[must_use]
    pub fn find_signup(
        &self,
        roster: &RosterSnapshot,
        week: WeekKey,
        player: &PlayerId,
    ) -> Option<SignupLocation> {
        let locate = |lists: Option<&CategoryLists>, category: Category, placement| {
            lists
                .and_then(|l| l.get(category).iter().position(|p| p == player))
                .map(|index| SignupLocation {
                    category,
                    placement,
                    position: index + 1,
                })
        };

        Category::ALL.iter().find_map(|category| {
            locate(roster.signups.get(&week), *category, Placement::Confirmed)
                .or_else(|| locate(roster.waitlists.get(&week), *category, Placement::Waitlisted))
        })
    }

    /// Confirmed counts with no-preference players counted toward the smaller side.
    ///
    /// Ties count toward man-matching. Display only: admission uses the
    /// per-category capacity.
    #[must_use]
    pub fn effective_counts(&self, roster: &RosterSnapshot, week: WeekKey) -> EffectiveCounts {
        let count = |category| {
            roster
                .signups
                .get(&week)
                .map_or(0, |l: &CategoryLists| l.get(category).len())
        };
        let (mmp, wmp, no_pref) = (
            count(Category::Mmp),
            count(Category::Wmp),
            count(Category::NoPreference),
        );

        if wmp < mmp {
            EffectiveCounts {
                mmp,
                wmp: wmp + no_pref,
                no_preference_leans: Category::Wmp,
            }
        } else {
            EffectiveCounts {
                mmp: mmp + no_pref,
                wmp,
                no_preference_leans: Category::Mmp,
            }
        }
    }
}
