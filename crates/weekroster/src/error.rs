//! Error types for weekroster.
//!
//! This module defines all error types used throughout the weekroster crate.
//! Signup errors are recoverable and meant to be shown to the person at the
//! keyboard; store and notification errors carry enough context for logs.

use std::path::PathBuf;
use thiserror::Error;

use crate::roster::{Category, Placement, PlayerId};
use crate::week::WeekKey;

/// The main error type for weekroster operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Signup Errors ===
    /// The player already holds a place in this week and category.
    #[error("{player} is already {placement} as {category} for the week of {week}")]
    DuplicateSignup {
        /// Player that tried to sign up.
        player: PlayerId,
        /// Week of the signup.
        week: WeekKey,
        /// Category of the signup.
        category: Category,
        /// Where the existing entry sits.
        placement: Placement,
    },

    /// The player has no signup in this week and category.
    #[error("{player} is not signed up as {category} for the week of {week}")]
    NotFound {
        /// Player that was looked up.
        player: PlayerId,
        /// Week that was searched.
        week: WeekKey,
        /// Category that was searched.
        category: Category,
    },

    /// The player has no signup in any category for this week.
    #[error("{player} has no signup for the week of {week}")]
    NotSignedUp {
        /// Player that was looked up.
        player: PlayerId,
        /// Week that was searched.
        week: WeekKey,
    },

    /// The confirmed sequence is full.
    ///
    /// Overflow is routed to the waitlist, so the signup manager never
    /// returns this.
    #[error("{category} is full for the week of {week} (capacity {capacity})")]
    CapacityExceeded {
        /// Week that is full.
        week: WeekKey,
        /// Category that is full.
        category: Category,
        /// Configured capacity.
        capacity: usize,
    },

    /// Player details failed validation.
    #[error("invalid player details: {message}")]
    InvalidPlayer {
        /// Description of the validation failure.
        message: String,
    },

    /// A week key could not be parsed.
    #[error("invalid week '{value}': expected a date formatted as YYYY-MM-DD")]
    InvalidWeek {
        /// The rejected input.
        value: String,
    },

    /// The week is outside the window currently open for signups.
    #[error("the week of {week} is not open for signups")]
    WeekNotOffered {
        /// The rejected week.
        week: WeekKey,
    },

    // === Store Errors ===
    /// The roster store could not be reached.
    #[error("roster store '{backend}' is unavailable: {message}")]
    StoreUnavailable {
        /// Name of the backend.
        backend: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// The roster store refused the request, usually a bad key or table.
    #[error("roster store '{backend}' rejected the request (HTTP {status}): {message}")]
    StoreRejected {
        /// Name of the backend.
        backend: &'static str,
        /// HTTP status code returned.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// A stored snapshot could not be interpreted.
    #[error("malformed roster snapshot: {message}")]
    SnapshotFormat {
        /// Description of what went wrong.
        message: String,
    },

    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Notification Errors ===
    /// A promotion notice could not be delivered.
    #[error("failed to notify {recipient}: {message}")]
    NotificationDeliveryFailed {
        /// Address the notice was meant for.
        recipient: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for weekroster operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a store unavailable error.
    #[must_use]
    pub fn store_unavailable(backend: &'static str, message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            backend,
            message: message.into(),
        }
    }

    /// Create an invalid player error.
    #[must_use]
    pub fn invalid_player(message: impl Into<String>) -> Self {
        Self::InvalidPlayer {
            message: message.into(),
        }
    }

    /// Create a snapshot format error.
    #[must_use]
    pub fn snapshot_format(message: impl Into<String>) -> Self {
        Self::SnapshotFormat {
            message: message.into(),
        }
    }

    /// Create a delivery failure for the given recipient.
    #[must_use]
    pub fn delivery_failed(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotificationDeliveryFailed {
            recipient: recipient.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error should trigger the local file fallback.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Check if this error is a recoverable condition caused by user input.
    ///
    /// These are printed inline without a backtrace of causes.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSignup { .. }
                | Self::NotFound { .. }
                | Self::NotSignedUp { .. }
                | Self::CapacityExceeded { .. }
                | Self::InvalidPlayer { .. }
                | Self::InvalidWeek { .. }
                | Self::WeekNotOffered { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week() -> WeekKey {
        WeekKey::parse("2025-01-06").unwrap()
    }

    #[test]
    fn test_duplicate_signup_display() {
        let err = Error::DuplicateSignup {
            player: PlayerId::from_name("Ada Lovelace"),
            week: week(),
            category: Category::Wmp,
            placement: Placement::Waitlisted,
        };
        let msg = err.to_string();
        assert!(msg.contains("ada_lovelace"));
        assert!(msg.contains("waitlisted"));
        assert!(msg.contains("WMP"));
        assert!(msg.contains("2025-01-06"));
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::NotFound {
            player: PlayerId::from_name("Grace"),
            week: week(),
            category: Category::NoPreference,
        };
        assert_eq!(
            err.to_string(),
            "grace is not signed up as XMP for the week of 2025-01-06"
        );
    }

    #[test]
    fn test_not_signed_up_display() {
        let err = Error::NotSignedUp {
            player: PlayerId::from_name("Grace"),
            week: week(),
        };
        assert_eq!(err.to_string(), "grace has no signup for the week of 2025-01-06");
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_capacity_exceeded_display() {
        let err = Error::CapacityExceeded {
            week: week(),
            category: Category::Mmp,
            capacity: 12,
        };
        assert!(err.to_string().contains("capacity 12"));
    }

    #[test]
    fn test_store_rejected_is_not_unavailable() {
        let err = Error::StoreRejected {
            backend: "hosted",
            status: 401,
            message: "Invalid API key".to_string(),
        };
        assert!(!err.is_store_unavailable());
        assert_eq!(
            err.to_string(),
            "roster store 'hosted' rejected the request (HTTP 401): Invalid API key"
        );
    }

    #[test]
    fn test_store_unavailable() {
        let err = Error::store_unavailable("hosted", "connection refused");
        assert!(err.is_store_unavailable());
        assert!(!err.is_user_facing());
        assert_eq!(
            err.to_string(),
            "roster store 'hosted' is unavailable: connection refused"
        );
    }

    #[test]
    fn test_user_facing_errors() {
        assert!(Error::invalid_player("name is required").is_user_facing());
        assert!(Error::WeekNotOffered { week: week() }.is_user_facing());
        assert!(!Error::internal("bug").is_user_facing());
        assert!(!Error::delivery_failed("a@b.io", "timeout").is_user_facing());
    }

    #[test]
    fn test_delivery_failed_display() {
        let err = Error::delivery_failed("ada@example.com", "535 auth failed");
        let msg = err.to_string();
        assert!(msg.contains("ada@example.com"));
        assert!(msg.contains("535 auth failed"));
    }

    #[test]
    fn test_invalid_week_display() {
        let err = Error::InvalidWeek {
            value: "next tuesday".to_string(),
        };
        assert!(err.to_string().contains("next tuesday"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/roster.db",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
