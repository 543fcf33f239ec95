//! The roster model: players, categories and per-week signup sequences.
//!
//! [`RosterSnapshot`] is the unit that stores load and save. Its JSON shape is
//! the persisted format:
//!
//! ```json
//! {
//!   "players":   { "ada": { "name": "Ada", "email": "ada@example.com", "type": null } },
//!   "signups":   { "2025-01-06": { "mmp": ["ada"], "wmp": [], "no_preference": [] } },
//!   "waitlists": { "2025-01-06": { "mmp": [], "wmp": [], "no_preference": [] } }
//! }
//! ```
//!
//! All mutation goes through [`SignupManager`].

pub mod manager;
pub mod player;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::week::WeekKey;

pub use manager::{EffectiveCounts, SignupManager};
pub use player::{PlayerId, PlayerInfo};

/// Confirmed slots per category per week unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 12;

/// Player-type signup bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Man-matching players.
    Mmp,
    /// Woman-matching players.
    Wmp,
    /// Players with no matching preference (shown as XMP).
    NoPreference,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 3] = [Self::Mmp, Self::Wmp, Self::NoPreference];

    /// The key used in stored snapshots.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Mmp => "mmp",
            Self::Wmp => "wmp",
            Self::NoPreference => "no_preference",
        }
    }

    /// Map a stored or typed category name to a category.
    ///
    /// Accepts the canonical keys plus the display names and the spellings
    /// older snapshots used.
    #[must_use]
    pub fn from_alias(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mmp" => Some(Self::Mmp),
            "wmp" => Some(Self::Wmp),
            "no_preference" | "no-preference" | "nopref" | "xmp" => Some(Self::NoPreference),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mmp => write!(f, "MMP"),
            Self::Wmp => write!(f, "WMP"),
            Self::NoPreference => write!(f, "XMP"),
        }
    }
}

impl FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::from_alias(s).ok_or_else(|| {
            crate::Error::invalid_player(format!(
                "unknown category '{s}' (expected mmp, wmp or xmp)"
            ))
        })
    }
}

/// Which sequence a player sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Holds a guaranteed slot.
    Confirmed,
    /// Waiting for a vacancy.
    Waitlisted,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => write!(f, "confirmed"),
            Self::Waitlisted => write!(f, "waitlisted"),
        }
    }
}

/// One ordered id list per category, as stored for a single week.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryLists {
    /// Man-matching players.
    pub mmp: Vec<PlayerId>,
    /// Woman-matching players.
    pub wmp: Vec<PlayerId>,
    /// No-preference players.
    pub no_preference: Vec<PlayerId>,
}

impl CategoryLists {
    /// The list for a category.
    #[must_use]
    pub fn get(&self, category: Category) -> &Vec<PlayerId> {
        match category {
            Category::Mmp => &self.mmp,
            Category::Wmp => &self.wmp,
            Category::NoPreference => &self.no_preference,
        }
    }

    /// The mutable list for a category.
    pub fn get_mut(&mut self, category: Category) -> &mut Vec<PlayerId> {
        match category {
            Category::Mmp => &mut self.mmp,
            Category::Wmp => &mut self.wmp,
            Category::NoPreference => &mut self.no_preference,
        }
    }

    /// Whether every list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_empty())
    }
}

/// Full persisted roster state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterSnapshot {
    /// Every player ever registered.
    pub players: BTreeMap<PlayerId, PlayerInfo>,
    /// Confirmed sequences by week.
    pub signups: BTreeMap<WeekKey, CategoryLists>,
    /// Waitlists by week.
    pub waitlists: BTreeMap<WeekKey, CategoryLists>,
}

impl RosterSnapshot {
    /// An empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize to the stored JSON form (two-space indent).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// BLAKE3 fingerprint of the stored JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn fingerprint(&self) -> crate::Result<String> {
        let json = self.to_json()?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// Every week that has a bucket, ascending.
    #[must_use]
    pub fn weeks(&self) -> Vec<WeekKey> {
        let mut weeks: Vec<WeekKey> = self
            .signups
            .keys()
            .chain(self.waitlists.keys())
            .copied()
            .collect();
        weeks.sort_unstable();
        weeks.dedup();
        weeks
    }

    /// Display name for an id, falling back to the id itself.
    #[must_use]
    pub fn display_name<'a>(&'a self, id: &'a PlayerId) -> &'a str {
        self.players.get(id).map_or(id.as_str(), |p| p.name.as_str())
    }

    /// Drop the bucket for one week. Returns `true` if anything was removed.
    pub fn clear_week(&mut self, week: WeekKey) -> bool {
        let had_signups = self.signups.remove(&week).is_some();
        let had_waitlist = self.waitlists.remove(&week).is_some();
        had_signups || had_waitlist
    }

    /// Drop every bucket older than `week`. Returns the number of weeks removed.
    pub fn prune_before(&mut self, week: WeekKey) -> usize {
        let stale: Vec<WeekKey> = self.weeks().into_iter().filter(|w| *w < week).collect();
        for w in &stale {
            self.clear_week(*w);
        }
        stale.len()
    }
}

/// Read-only copy of one week + category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryRoster {
    /// Players holding a slot, in signup order.
    pub confirmed: Vec<PlayerId>,
    /// Players waiting, in arrival order.
    pub waitlist: Vec<PlayerId>,
}

/// Read-only copy of every category for one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekBucket {
    /// The week.
    pub week: WeekKey,
    /// Man-matching sequences.
    pub mmp: CategoryRoster,
    /// Woman-matching sequences.
    pub wmp: CategoryRoster,
    /// No-preference sequences.
    pub no_preference: CategoryRoster,
}

impl WeekBucket {
    /// The sequences for a category.
    #[must_use]
    pub fn get(&self, category: Category) -> &CategoryRoster {
        match category {
            Category::Mmp => &self.mmp,
            Category::Wmp => &self.wmp,
            Category::NoPreference => &self.no_preference,
        }
    }

    /// Whether nobody is signed up or waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| {
            let roster = self.get(*c);
            roster.confirmed.is_empty() && roster.waitlist.is_empty()
        })
    }
}

/// Result of a successful signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignupStatus {
    /// Which sequence the player joined.
    pub placement: Placement,
    /// 1-based position in that sequence.
    pub position: usize,
}

impl SignupStatus {
    /// Whether the player got a slot.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.placement == Placement::Confirmed
    }
}

/// Where a player currently sits in a week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignupLocation {
    /// Category holding the player.
    pub category: Category,
    /// Sequence holding the player.
    pub placement: Placement,
    /// 1-based position in that sequence.
    pub position: usize,
}

/// A waitlisted player moved into a vacated slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionEvent {
    /// The promoted player.
    pub player: PlayerId,
    /// Week of the promotion.
    pub week: WeekKey,
    /// Category of the promotion.
    pub category: Category,
}

/// Result of a successful removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalOutcome {
    /// Which sequence the player was removed from.
    pub removed_from: Placement,
    /// The promotion the vacancy triggered, if any.
    pub promotion: Option<PromotionEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(s: &str) -> WeekKey {
        WeekKey::parse(s).unwrap()
    }

    #[test]
    fn test_category_keys_and_display() {
        assert_eq!(Category::NoPreference.key(), "no_preference");
        assert_eq!(Category::NoPreference.to_string(), "XMP");
        assert_eq!(Category::Mmp.to_string(), "MMP");
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!(Category::from_alias("MMP"), Some(Category::Mmp));
        assert_eq!(Category::from_alias("xmp"), Some(Category::NoPreference));
        assert_eq!(Category::from_alias("no-preference"), Some(Category::NoPreference));
        assert_eq!(Category::from_alias("open"), None);
        assert!("open".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&Category::NoPreference).unwrap();
        assert_eq!(json, "\"no_preference\"");
    }

    #[test]
    fn test_empty_snapshot_shape() {
        let json = serde_json::to_value(RosterSnapshot::new()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"players": {}, "signups": {}, "waitlists": {}})
        );
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let mut snapshot = RosterSnapshot::new();
        let before = snapshot.fingerprint().unwrap();
        assert_eq!(before, RosterSnapshot::new().fingerprint().unwrap());

        snapshot
            .players
            .insert(PlayerId::from_name("Ada"), PlayerInfo::new("Ada", "ada@example.com"));
        assert_ne!(before, snapshot.fingerprint().unwrap());
    }

    #[test]
    fn test_weeks_merges_both_maps() {
        let mut snapshot = RosterSnapshot::new();
        snapshot.signups.insert(week("2025-01-13"), CategoryLists::default());
        snapshot.waitlists.insert(week("2025-01-06"), CategoryLists::default());
        snapshot.waitlists.insert(week("2025-01-13"), CategoryLists::default());
        assert_eq!(snapshot.weeks(), vec![week("2025-01-06"), week("2025-01-13")]);
    }

    #[test]
    fn test_prune_before_keeps_current_and_later() {
        let mut snapshot = RosterSnapshot::new();
        for w in ["2024-12-30", "2025-01-06", "2025-01-13"] {
            snapshot.signups.insert(week(w), CategoryLists::default());
            snapshot.waitlists.insert(week(w), CategoryLists::default());
        }
        assert_eq!(snapshot.prune_before(week("2025-01-06")), 1);
        assert_eq!(snapshot.weeks(), vec![week("2025-01-06"), week("2025-01-13")]);
    }

    #[test]
    fn test_clear_week_reports_absence() {
        let mut snapshot = RosterSnapshot::new();
        assert!(!snapshot.clear_week(week("2025-01-06")));
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let snapshot = RosterSnapshot::new();
        let id = PlayerId::from_raw("ghost");
        assert_eq!(snapshot.display_name(&id), "ghost");
    }
}
