//! Configuration management for weekroster.
//!
//! This module provides configuration loading and validation using figment,
//! layering a secrets file, environment variables, a TOML config file and
//! built-in defaults into one immutable [`Config`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::roster::DEFAULT_CAPACITY;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default secrets file name, looked up next to the config file.
const SECRETS_FILE_NAME: &str = "secrets.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "weekroster";

/// Default JSON roster file name.
const DATA_FILE_NAME: &str = "signup_data.json";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "roster.db";

/// Prefix for structured environment variables.
const ENV_PREFIX: &str = "WEEKROSTER_";

/// Plain environment variables understood for compatibility with older
/// deployments, and the setting each one feeds.
const PLAIN_ENV_VARS: &[(&str, &str)] = &[
    ("SMTP_SERVER", "email.smtp_server"),
    ("SMTP_PORT", "email.smtp_port"),
    ("SENDER_EMAIL", "email.sender_email"),
    ("SENDER_PASSWORD", "email.sender_password"),
    ("EMAIL_ENABLED", "email.enabled"),
    ("SUPABASE_URL", "hosted.url"),
    ("SUPABASE_KEY", "hosted.key"),
];

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Secrets file (`secrets.toml` next to the config file)
/// 2. Environment variables (`WEEKROSTER_<SECTION>__<KEY>`, then the plain
///    `SMTP_*`/`SENDER_*`/`SUPABASE_*` names)
/// 3. TOML config file at `~/.config/weekroster/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Email notification settings.
    pub email: EmailConfig,
    /// Hosted row-store settings.
    pub hosted: HostedConfig,
    /// Local storage settings.
    pub storage: StorageConfig,
    /// Roster rules.
    pub roster: RosterConfig,
    /// Wording used in notices.
    pub event: EventConfig,
}

/// SMTP settings for promotion notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// SMTP relay host.
    pub smtp_server: String,
    /// SMTP submission port (STARTTLS).
    pub smtp_port: u16,
    /// Sender address, also used as the SMTP username.
    pub sender_email: String,
    /// SMTP password. Never serialized back out.
    #[serde(skip_serializing)]
    pub sender_password: String,
    /// Whether notices are sent at all.
    pub enabled: bool,
}

/// Hosted row-store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostedConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub url: Option<String>,
    /// API key. Never serialized back out.
    #[serde(skip_serializing)]
    pub key: Option<String>,
    /// Whether to use the hosted store.
    pub enabled: bool,
    /// Table holding the roster row.
    pub table: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Which local backend holds the roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// A pretty-printed JSON file.
    #[default]
    File,
    /// A single-row table in a local `SQLite` database.
    Sqlite,
}

/// Local storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Local backend. The JSON file is also the hosted fallback.
    pub backend: StorageBackend,
    /// Path to the JSON roster file.
    /// Defaults to `~/.local/share/weekroster/signup_data.json`
    pub data_file: Option<PathBuf>,
    /// Path to the database file.
    /// Defaults to `~/.local/share/weekroster/roster.db`
    pub database_path: Option<PathBuf>,
}

/// Roster rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Confirmed slots per category per week.
    pub capacity: usize,
    /// Future weeks open for signups, besides the current one.
    pub weeks_ahead: u32,
}

/// Wording used in notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Name of the weekly event, used in subjects.
    pub title: String,
    /// Closing line of every notice.
    pub signature: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            sender_email: String::new(),
            sender_password: String::new(),
            enabled: false,
        }
    }
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            enabled: false,
            table: "signup_data".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            weeks_ahead: 4,
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            title: "Weekly Signup".to_string(),
            signature: "See you there!".to_string(),
        }
    }
}

impl EmailConfig {
    /// Whether enough is configured to attempt delivery.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.sender_email.trim().is_empty()
    }
}

impl Config {
    /// Load configuration from all sources using the default paths.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration with optional custom config and secrets paths.
    ///
    /// When no secrets path is given, `secrets.toml` next to the config file
    /// is used if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>, secrets_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let secrets_file = secrets_path.unwrap_or_else(|| Self::secrets_path_for(&config_file));

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(plain_env())
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Toml::file(&secrets_file));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// The secrets file that accompanies a config file.
    #[must_use]
    pub fn secrets_path_for(config_file: &Path) -> PathBuf {
        config_file.with_file_name(SECRETS_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.roster.capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "roster.capacity must be greater than 0".to_string(),
            });
        }

        if self.email.enabled && self.email.smtp_port == 0 {
            return Err(Error::ConfigValidation {
                message: "email.smtp_port must be greater than 0".to_string(),
            });
        }

        if self.hosted.enabled {
            let missing = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
            if missing(&self.hosted.url) || missing(&self.hosted.key) {
                return Err(Error::ConfigValidation {
                    message: "hosted.url and hosted.key are required when hosted.enabled is set"
                        .to_string(),
                });
            }
            if self.hosted.timeout_secs == 0 {
                return Err(Error::ConfigValidation {
                    message: "hosted.timeout_secs must be greater than 0".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the JSON roster file path, resolving defaults if not set.
    #[must_use]
    pub fn data_file(&self) -> PathBuf {
        self.storage
            .data_file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATA_FILE_NAME))
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the hosted request timeout as a Duration.
    #[must_use]
    pub fn hosted_timeout(&self) -> Duration {
        Duration::from_secs(self.hosted.timeout_secs)
    }
}

/// The unprefixed environment variables, mapped onto their settings.
fn plain_env() -> Env {
    Env::raw().filter_map(|key| {
        PLAIN_ENV_VARS
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, setting)| (*setting).into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("weekroster_config_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(!config.email.enabled);
        assert!(!config.hosted.enabled);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.roster.capacity, 12);
        assert_eq!(config.roster.weeks_ahead, 4);
    }

    #[test]
    fn test_default_email_config() {
        let email = EmailConfig::default();

        assert_eq!(email.smtp_server, "smtp.gmail.com");
        assert_eq!(email.smtp_port, 587);
        assert!(email.sender_email.is_empty());
        assert!(!email.is_active());
    }

    #[test]
    fn test_email_active_requires_sender() {
        let mut email = EmailConfig {
            enabled: true,
            ..EmailConfig::default()
        };
        assert!(!email.is_active());
        email.sender_email = "coach@example.com".to_string();
        assert!(email.is_active());
    }

    #[test]
    fn test_default_hosted_config() {
        let hosted = HostedConfig::default();

        assert!(hosted.url.is_none());
        assert!(hosted.key.is_none());
        assert_eq!(hosted.table, "signup_data");
        assert_eq!(hosted.timeout_secs, 10);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = Config::default();
        config.roster.capacity = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("roster.capacity"));
    }

    #[test]
    fn test_validate_hosted_requires_credentials() {
        let mut config = Config::default();
        config.hosted.enabled = true;
        config.hosted.url = Some("https://abc.supabase.co".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("hosted.key"));

        config.hosted.key = Some("anon".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_port_when_enabled() {
        let mut config = Config::default();
        config.email.enabled = true;
        config.email.smtp_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_file_default() {
        let config = Config::default();
        assert!(config
            .data_file()
            .to_string_lossy()
            .contains("signup_data.json"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/roster.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/roster.sqlite")
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("weekroster"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_secrets_path_sits_next_to_config() {
        let secrets = Config::secrets_path_for(Path::new("/etc/weekroster/config.toml"));
        assert_eq!(secrets, PathBuf::from("/etc/weekroster/secrets.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(
            Some(PathBuf::from("/nonexistent/config.toml")),
            Some(PathBuf::from("/nonexistent/secrets.toml")),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_secrets_override_config_file() {
        let config_path = temp_path("layered.toml");
        let secrets_path = temp_path("layered_secrets.toml");
        std::fs::write(
            &config_path,
            "[email]\nsender_email = \"file@example.com\"\nsmtp_port = 2525\n\n[roster]\ncapacity = 8\n",
        )
        .unwrap();
        std::fs::write(
            &secrets_path,
            "[email]\nsender_email = \"secret@example.com\"\nsender_password = \"hunter2\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(config_path.clone()), Some(secrets_path.clone()));

        let _ = std::fs::remove_file(&config_path);
        let _ = std::fs::remove_file(&secrets_path);

        let config = config.unwrap();
        assert_eq!(config.email.sender_email, "secret@example.com");
        assert_eq!(config.email.sender_password, "hunter2");
        assert_eq!(config.email.smtp_port, 2525);
        assert_eq!(config.roster.capacity, 8);
    }

    fn load_in_jail() -> figment::error::Result<Config> {
        Config::load_from(Some(PathBuf::from("config.toml")), None).map_err(|e| e.to_string().into())
    }

    #[test]
    fn test_plain_env_vars_map_to_settings() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SMTP_SERVER", "smtp.example.com");
            jail.set_env("SMTP_PORT", "2525");
            jail.set_env("SENDER_EMAIL", "coach@example.com");
            jail.set_env("SENDER_PASSWORD", "hunter2");
            jail.set_env("EMAIL_ENABLED", "true");
            jail.set_env("SUPABASE_URL", "https://roster.example.com");
            jail.set_env("SUPABASE_KEY", "service-role");

            let config = load_in_jail()?;
            assert_eq!(config.email.smtp_server, "smtp.example.com");
            assert_eq!(config.email.smtp_port, 2525);
            assert_eq!(config.email.sender_email, "coach@example.com");
            assert_eq!(config.email.sender_password, "hunter2");
            assert!(config.email.enabled);
            assert_eq!(config.hosted.url.as_deref(), Some("https://roster.example.com"));
            assert_eq!(config.hosted.key.as_deref(), Some("service-role"));
            assert!(!config.hosted.enabled);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_config_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                "[email]\nsmtp_port = 2525\nsender_email = \"file@example.com\"\n\n[roster]\ncapacity = 8\nweeks_ahead = 2\n",
            )?;
            jail.set_env("SENDER_EMAIL", "env@example.com");
            jail.set_env("WEEKROSTER_ROSTER__CAPACITY", "10");
            jail.set_env("WEEKROSTER_STORAGE__BACKEND", "sqlite");

            let config = load_in_jail()?;
            assert_eq!(config.email.sender_email, "env@example.com");
            assert_eq!(config.email.smtp_port, 2525);
            assert_eq!(config.roster.capacity, 10);
            assert_eq!(config.roster.weeks_ahead, 2);
            assert_eq!(config.storage.backend, StorageBackend::Sqlite);
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_overrides_plain_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SMTP_PORT", "2525");
            jail.set_env("WEEKROSTER_EMAIL__SMTP_PORT", "465");

            assert_eq!(load_in_jail()?.email.smtp_port, 465);
            Ok(())
        });
    }

    #[test]
    fn test_secrets_override_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[email]\nsender_email = \"file@example.com\"\n")?;
            jail.create_file(
                "secrets.toml",
                "[email]\nsender_password = \"from-secrets\"\n\n[hosted]\nkey = \"secret-key\"\n",
            )?;
            jail.set_env("SENDER_PASSWORD", "from-env");
            jail.set_env("SUPABASE_KEY", "env-key");
            jail.set_env("WEEKROSTER_EMAIL__SENDER_EMAIL", "env@example.com");

            let config = load_in_jail()?;
            assert_eq!(config.email.sender_password, "from-secrets");
            assert_eq!(config.hosted.key.as_deref(), Some("secret-key"));
            assert_eq!(config.email.sender_email, "env@example.com");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_file_value_is_rejected() {
        let config_path = temp_path("invalid.toml");
        std::fs::write(&config_path, "[roster]\ncapacity = 0\n").unwrap();

        let result = Config::load_from(
            Some(config_path.clone()),
            Some(PathBuf::from("/nonexistent/secrets.toml")),
        );
        let _ = std::fs::remove_file(&config_path);

        assert!(matches!(result, Err(Error::ConfigValidation { .. })));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut config = Config::default();
        config.email.sender_password = "hunter2".to_string();
        config.hosted.key = Some("service-role".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("service-role"));
        assert!(json.contains("smtp_server"));
    }

    #[test]
    fn test_storage_backend_deserialize() {
        let storage: StorageConfig = serde_json::from_str(r#"{"backend": "sqlite"}"#).unwrap();
        assert_eq!(storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn test_hosted_timeout() {
        let config = Config::default();
        assert_eq!(config.hosted_timeout(), Duration::from_secs(10));
    }
}
