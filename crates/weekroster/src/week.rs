//! Week keys and the signup calendar.
//!
//! A week is identified by the Monday it starts on, written `YYYY-MM-DD`.
//! Any date can be turned into a key; it is normalized to its Monday.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Storage format of a week key.
const KEY_FORMAT: &str = "%Y-%m-%d";

/// The Monday that identifies a signup week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey(NaiveDate);

impl WeekKey {
    /// The week containing the given date.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday();
        Self(date - Duration::days(i64::from(offset)))
    }

    /// The week containing today's local date.
    #[must_use]
    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    /// Parse a `YYYY-MM-DD` date into the key of its week.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWeek`] if the input is not a valid date.
    pub fn parse(value: &str) -> Result<Self> {
        NaiveDate::parse_from_str(value.trim(), KEY_FORMAT)
            .map(Self::containing)
            .map_err(|_| Error::InvalidWeek {
                value: value.to_string(),
            })
    }

    /// The Monday this week starts on.
    #[must_use]
    pub fn monday(&self) -> NaiveDate {
        self.0
    }

    /// The following week.
    #[must_use]
    pub fn next(&self) -> Self {
        Self(self.0 + Duration::weeks(1))
    }

    /// Human-readable label, e.g. `Week of Jan 06 - Jan 12, 2025`.
    #[must_use]
    pub fn label(&self) -> String {
        let end = self.0 + Duration::days(6);
        format!(
            "Week of {} - {}",
            self.0.format("%b %d"),
            end.format("%b %d, %Y")
        )
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(KEY_FORMAT))
    }
}

impl FromStr for WeekKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for WeekKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeekKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Weeks open for signups: the current week plus `weeks_ahead` future weeks.
#[must_use]
pub fn offered_weeks(today: NaiveDate, weeks_ahead: u32) -> Vec<WeekKey> {
    let mut week = WeekKey::containing(today);
    let mut weeks = Vec::with_capacity(weeks_ahead as usize + 1);
    weeks.push(week);
    for _ in 0..weeks_ahead {
        week = week.next();
        weeks.push(week);
    }
    weeks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, KEY_FORMAT).unwrap()
    }

    #[test]
    fn test_containing_normalizes_to_monday() {
        // 2025-01-08 is a Wednesday, 2025-01-12 a Sunday.
        assert_eq!(WeekKey::containing(date("2025-01-08")).to_string(), "2025-01-06");
        assert_eq!(WeekKey::containing(date("2025-01-12")).to_string(), "2025-01-06");
        assert_eq!(WeekKey::containing(date("2025-01-06")).to_string(), "2025-01-06");
    }

    #[test]
    fn test_parse_across_year_boundary() {
        let week = WeekKey::parse("2025-01-01").unwrap();
        assert_eq!(week.to_string(), "2024-12-30");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            WeekKey::parse("soon"),
            Err(Error::InvalidWeek { .. })
        ));
        assert!(WeekKey::parse("2025-02-30").is_err());
    }

    #[test]
    fn test_label() {
        let week = WeekKey::parse("2024-12-30").unwrap();
        assert_eq!(week.label(), "Week of Dec 30 - Jan 05, 2025");
    }

    #[test]
    fn test_offered_weeks() {
        let weeks = offered_weeks(date("2025-01-08"), 4);
        let keys: Vec<String> = weeks.iter().map(ToString::to_string).collect();
        assert_eq!(
            keys,
            vec![
                "2025-01-06",
                "2025-01-13",
                "2025-01-20",
                "2025-01-27",
                "2025-02-03"
            ]
        );
    }

    #[test]
    fn test_offered_weeks_current_only() {
        let weeks = offered_weeks(date("2025-01-08"), 0);
        assert_eq!(weeks.len(), 1);
    }

    #[test]
    fn test_ordering_follows_dates() {
        let a = WeekKey::parse("2025-01-06").unwrap();
        assert!(a < a.next());
    }

    #[test]
    fn test_serde_as_string() {
        let week = WeekKey::parse("2025-01-09").unwrap();
        let json = serde_json::to_string(&week).unwrap();
        assert_eq!(json, "\"2025-01-06\"");
        let back: WeekKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, week);
    }

    #[test]
    fn test_from_str() {
        let week: WeekKey = "2025-01-06".parse().unwrap();
        assert_eq!(week.monday(), date("2025-01-06"));
    }
}
