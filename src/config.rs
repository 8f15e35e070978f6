//! Run configuration handed to the sync core by its caller.
//!
//! The core never reads environment variables or files; whoever invokes a run
//! builds a [`SyncConfig`] (directly or by deserializing it) and passes
//! [`Credentials`] explicitly.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::download::DEFAULT_MAX_RETRIES;
use crate::download::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Errors raised by [`SyncConfig::validate`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base URL is empty or cannot be parsed.
    #[error("invalid base URL: {url:?}")]
    InvalidBaseUrl {
        /// The rejected value.
        url: String,
    },

    /// A min/max pair has its bounds inverted.
    #[error("{field}: minimum {min_ms}ms exceeds maximum {max_ms}ms")]
    InvertedRange {
        /// Name of the offending setting.
        field: &'static str,
        /// Configured minimum in milliseconds.
        min_ms: u128,
        /// Configured maximum in milliseconds.
        max_ms: u128,
    },

    /// The retry ceiling is zero.
    #[error("retry.max_attempts must be at least 1")]
    ZeroAttempts,

    /// The storage file extension is unusable in the canonical filename.
    #[error("invalid file extension {extension:?}: must be non-empty alphanumeric")]
    InvalidExtension {
        /// The rejected extension.
        extension: String,
    },

    /// No storage location was configured.
    #[error("storage_dir must not be empty")]
    EmptyStorageDir,
}

/// Account credentials for the gated source.
///
/// Supplied by the caller for the duration of a run and never persisted.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    /// Account e-mail / login name.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials from an e-mail and password.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Returns true when both fields are non-blank.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Endpoints of the gated source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceEndpoints {
    /// Site root, e.g. `https://source.example`.
    pub base_url: String,
    /// Path of the login endpoint (form POST).
    pub login_path: String,
    /// Path of the page carrying the catalogue table.
    pub catalogue_path: String,
    /// Path of the logout endpoint.
    pub logout_path: String,
    /// Content path used for fetchable rows whose control carries no href.
    pub content_fallback_path: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            login_path: "/ajax/login".to_string(),
            catalogue_path: "/tests".to_string(),
            logout_path: "/logout".to_string(),
            content_fallback_path: "/tests/online".to_string(),
        }
    }
}

impl SourceEndpoints {
    /// Creates endpoints for a base URL with default paths.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Overrides the catalogue page path.
    #[must_use]
    pub fn with_catalogue_path(mut self, path: impl Into<String>) -> Self {
        self.catalogue_path = path.into();
        self
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Joins a configured path onto the base URL.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base())
        } else {
            format!("{}/{path}", self.base())
        }
    }

    /// Login endpoint URL.
    #[must_use]
    pub fn login_url(&self) -> String {
        self.url_for(&self.login_path)
    }

    /// Catalogue page URL.
    #[must_use]
    pub fn catalogue_url(&self) -> String {
        self.url_for(&self.catalogue_path)
    }

    /// Logout endpoint URL.
    #[must_use]
    pub fn logout_url(&self) -> String {
        self.url_for(&self.logout_path)
    }

    /// Content URL for a fetchable row that exposes no href of its own.
    #[must_use]
    pub fn fallback_content_url(&self, date: NaiveDate) -> String {
        let url = self.url_for(&self.content_fallback_path);
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}date={}", date.format("%Y-%m-%d"))
    }
}

/// Retry settings for transient fetch failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per item, including the first (default: 3).
    pub max_attempts: u32,
    /// Lower bound of the delay between attempts (default: 1s).
    #[serde(with = "duration_ms")]
    pub min_backoff: Duration,
    /// Upper bound of the delay between attempts (default: 32s).
    #[serde(with = "duration_ms")]
    pub max_backoff: Duration,
    /// Multiplier applied per failed attempt (default: 2.0).
    pub backoff_multiplier: f32,
    /// Upper bound of random jitter added to each delay (default: 500ms).
    #[serde(with = "duration_ms")]
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(32),
            backoff_multiplier: 2.0,
            max_jitter: Duration::from_millis(500),
        }
    }
}

/// Randomized pause between distinct catalogue items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolitenessConfig {
    /// Shortest pause (default: 3s).
    #[serde(with = "duration_ms")]
    pub min_delay: Duration,
    /// Longest pause (default: 7s).
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(7),
        }
    }
}

/// Session lifetime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a login is trusted before it is treated as expired (default: 1h).
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    /// Pause between priming the base page and posting the login form (default: 2s).
    #[serde(with = "duration_ms")]
    pub login_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            login_delay: Duration::from_secs(2),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connect timeout (default: 30s).
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Whole-request timeout (default: 30s).
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// User-Agent override; the crate default is used when absent.
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: None,
        }
    }
}

/// Complete configuration of one synchronization pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Source endpoints.
    pub source: SourceEndpoints,
    /// Retry policy settings.
    pub retry: RetryConfig,
    /// Politeness delay between items.
    pub politeness: PolitenessConfig,
    /// Session lifetime.
    pub session: SessionConfig,
    /// HTTP client settings.
    pub http: HttpConfig,
    /// Directory holding `item_YYYY-MM-DD.<ext>` files.
    pub storage_dir: PathBuf,
    /// Extension of persisted items (default: `html`).
    pub file_extension: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: SourceEndpoints::default(),
            retry: RetryConfig::default(),
            politeness: PolitenessConfig::default(),
            session: SessionConfig::default(),
            http: HttpConfig::default(),
            storage_dir: PathBuf::from("./items"),
            file_extension: "html".to_string(),
        }
    }
}

impl SyncConfig {
    /// Creates a configuration for a source and storage directory with default tuning.
    pub fn new(base_url: impl Into<String>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: SourceEndpoints::new(base_url),
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }

    /// Checks the configuration for values the sync core cannot work with.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.source.base_url.trim();
        if base.is_empty() || Url::parse(base).is_err() {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.source.base_url.clone(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        check_range(
            "retry.backoff",
            self.retry.min_backoff,
            self.retry.max_backoff,
        )?;
        check_range(
            "politeness.delay",
            self.politeness.min_delay,
            self.politeness.max_delay,
        )?;
        if self.file_extension.is_empty()
            || !self
                .file_extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::InvalidExtension {
                extension: self.file_extension.clone(),
            });
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyStorageDir);
        }
        Ok(())
    }
}

fn check_range(field: &'static str, min: Duration, max: Duration) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::InvertedRange {
            field,
            min_ms: min.as_millis(),
            max_ms: max.as_millis(),
        });
    }
    Ok(())
}

/// Serializes a `Duration` as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serializes a `Duration` as whole seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_config() -> SyncConfig {
        SyncConfig::new("https://source.example", "/tmp/items")
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = SyncConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.politeness.min_delay, Duration::from_secs(3));
        assert_eq!(config.politeness.max_delay, Duration::from_secs(7));
        assert_eq!(config.session.ttl, Duration::from_secs(3600));
        assert_eq!(config.file_extension, "html");
    }

    #[test]
    fn test_validate_accepts_new_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_base_url() {
        let config = SyncConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = valid_config();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroAttempts)));
    }

    #[test]
    fn test_validate_rejects_inverted_politeness_range() {
        let mut config = valid_config();
        config.politeness.min_delay = Duration::from_secs(10);
        config.politeness.max_delay = Duration::from_secs(1);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("politeness.delay"), "{err}");
    }

    #[test]
    fn test_validate_rejects_inverted_backoff_range() {
        let mut config = valid_config();
        config.retry.min_backoff = Duration::from_secs(60);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedRange {
                field: "retry.backoff",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_extension_with_separator() {
        let mut config = valid_config();
        config.file_extension = "../html".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidExtension { .. })
        ));
        config.file_extension = "tar.gz".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_urls_join_paths() {
        let endpoints = SourceEndpoints::new("https://source.example/").with_catalogue_path("list");
        assert_eq!(endpoints.login_url(), "https://source.example/ajax/login");
        assert_eq!(endpoints.catalogue_url(), "https://source.example/list");
        assert_eq!(endpoints.logout_url(), "https://source.example/logout");
    }

    #[test]
    fn test_fallback_content_url_appends_date_query() {
        let mut endpoints = SourceEndpoints::new("https://source.example");
        let date = NaiveDate::from_ymd_opt(2025, 8, 10).unwrap();
        assert_eq!(
            endpoints.fallback_content_url(date),
            "https://source.example/tests/online?date=2025-08-10"
        );
        endpoints.content_fallback_path = "/tests/online?lang=es".to_string();
        assert_eq!(
            endpoints.fallback_content_url(date),
            "https://source.example/tests/online?lang=es&date=2025-08-10"
        );
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("user@example.com", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("user@example.com"));
        assert!(!debug.contains("hunter2"), "password leaked: {debug}");
    }

    #[test]
    fn test_credentials_completeness() {
        assert!(Credentials::new("a@b.c", "pw").is_complete());
        assert!(!Credentials::new("  ", "pw").is_complete());
        assert!(!Credentials::new("a@b.c", "").is_complete());
    }

    #[test]
    fn test_config_deserializes_with_partial_fields() {
        let json = r#"{
            "source": { "base_url": "https://source.example", "catalogue_path": "/list" },
            "retry": { "max_attempts": 5, "min_backoff": 250 },
            "politeness": { "min_delay": 0, "max_delay": 10 },
            "storage_dir": "/data/items"
        }"#;
        let config: SyncConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.source.catalogue_path, "/list");
        assert_eq!(config.source.login_path, "/ajax/login");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.min_backoff, Duration::from_millis(250));
        assert_eq!(config.retry.max_backoff, Duration::from_secs(32));
        assert_eq!(config.politeness.max_delay, Duration::from_millis(10));
        assert_eq!(config.storage_dir, PathBuf::from("/data/items"));
        assert!(config.validate().is_ok());
    }
}
