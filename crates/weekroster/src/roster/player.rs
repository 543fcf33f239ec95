//! Player identity and contact details.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Category;
use crate::error::{Error, Result};

/// Loose shape check for a contact address: `local@domain.tld`.
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s.]+$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

/// Stable identifier of a player, derived from their name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Derive the id for a display name.
    ///
    /// Lower-cases, trims, and replaces each inner space with `_`, so
    /// `" Ada Lovelace "` and `"ada lovelace"` name the same player.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(name.trim().to_lowercase().replace(' ', "_"))
    }

    /// Wrap an id read from storage without normalizing it.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the roster remembers about a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// Name as the player last entered it.
    pub name: String,
    /// Where promotion notices go.
    #[serde(default)]
    pub email: Option<String>,
    /// Preferred category, if one was ever recorded.
    #[serde(rename = "type", default)]
    pub preferred: Option<Category>,
}

impl PlayerInfo {
    /// Create a record with a contact address and no preferred category.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: Some(email.into()),
            preferred: None,
        }
    }

    /// The contact address, if one is set and non-empty.
    #[must_use]
    pub fn contact(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.trim().is_empty())
    }
}

/// Validate a name/address pair entered at signup.
///
/// # Errors
///
/// Returns [`Error::InvalidPlayer`] when the name is blank or the address does
/// not look like an email address.
pub fn validate_details(name: &str, email: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_player("a name is required"));
    }
    if !email_regex().is_match(email.trim()) {
        return Err(Error::invalid_player(format!(
            "'{}' is not a valid email address",
            email.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_name() {
        assert_eq!(PlayerId::from_name("  Ada Lovelace ").as_str(), "ada_lovelace");
        assert_eq!(
            PlayerId::from_name("Ada Lovelace"),
            PlayerId::from_name("ada lovelace")
        );
    }

    #[test]
    fn test_id_from_raw_is_untouched() {
        assert_eq!(PlayerId::from_raw("Mixed Case").as_str(), "Mixed Case");
    }

    #[test]
    fn test_validate_accepts_plain_address() {
        assert!(validate_details("Ada", "ada@example.com").is_ok());
        assert!(validate_details("Ada", " ada.l@mail.example.org ").is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let err = validate_details("   ", "ada@example.com").unwrap_err();
        assert!(err.to_string().contains("name is required"));
    }

    #[test]
    fn test_validate_rejects_bad_addresses() {
        for bad in ["", "ada", "ada@", "ada@example", "@example.com", "a b@example.com"] {
            assert!(validate_details("Ada", bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_player_info_serializes_type_key() {
        let info = PlayerInfo::new("Ada", "ada@example.com");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Ada", "email": "ada@example.com", "type": null})
        );
    }

    #[test]
    fn test_player_info_tolerates_missing_fields() {
        let info: PlayerInfo = serde_json::from_str(r#"{"name": "Grace"}"#).unwrap();
        assert_eq!(info.email, None);
        assert_eq!(info.preferred, None);
        assert_eq!(info.contact(), None);
    }

    #[test]
    fn test_contact_ignores_blank_address() {
        let mut info = PlayerInfo::new("Ada", "  ");
        assert_eq!(info.contact(), None);
        info.email = Some("ada@example.com".to_string());
        assert_eq!(info.contact(), Some("ada@example.com"));
    }
}
