//! Retry logic with exponential backoff for transient fetch failures.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types for
//! classifying fetch errors and determining retry behavior.
//!
//! # Overview
//!
//! When a fetch fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - Temporary failures that may succeed on retry
//! - [`FailureType::Permanent`] - Failures that won't succeed regardless of retries
//! - [`FailureType::AuthChallenge`] - The session was rejected; handled by re-authentication
//! - [`FailureType::RateLimited`] - Server rate limiting (retries with backoff)
//!
//! The [`RetryPolicy`] then determines whether to retry based on failure type
//! and attempt count. Delays grow exponentially, carry random jitter, and are
//! always clamped into the configured `[min_backoff, max_backoff]` window.
//!
//! # Example
//!
//! ```
//! use catalogue_sync_core::download::{
//!     FetchError, RetryPolicy, FailureType, RetryDecision, classify_error
//! };
//!
//! let policy = RetryPolicy::default();
//! let error = FetchError::http_status("https://source.example/item", 503);
//! let failure_type = classify_error(&error);
//!
//! match policy.should_retry(failure_type, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::FetchError;
use crate::config::RetryConfig;

/// Default maximum attempts per item.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default lower delay bound (1 second).
const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(1);

/// Default upper delay bound (32 seconds).
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Default maximum jitter added to delays (500ms).
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of fetch failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: network timeout, 5xx server errors, connection refused.
    Transient,

    /// Permanent failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, 400 Bad Request, invalid URL.
    Permanent,

    /// The source challenged the session (401/403 or login redirect).
    ///
    /// Never retried by the policy; the fetcher re-authenticates once instead.
    AuthChallenge,

    /// Server rate limiting (HTTP 429).
    RateLimited,
}

/// Decision on whether to retry a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the fetch after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the fetch.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `min_backoff`: 1 second
/// - `max_backoff`: 32 seconds
/// - `backoff_multiplier`: 2.0
/// - `max_jitter`: 500ms
///
/// # Delay Calculation
///
/// ```text
/// delay = clamp(min_backoff * multiplier^(attempt-1) + jitter, min_backoff, max_backoff)
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay before the first retry, and the floor for every delay.
    min_backoff: Duration,

    /// Ceiling for every delay.
    max_backoff: Duration,

    /// Multiplier applied each attempt (typically 2.0 for doubling).
    backoff_multiplier: f32,

    /// Upper bound of the random jitter.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.min_backoff,
            config.max_backoff,
            config.backoff_multiplier,
        )
        .with_max_jitter(config.max_jitter)
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum attempts including initial (must be >= 1)
    /// * `min_backoff` - Delay for the first retry and floor for all delays
    /// * `max_backoff` - Maximum delay cap (raised to `min_backoff` if lower)
    /// * `backoff_multiplier` - Multiplier for exponential increase
    #[must_use]
    pub fn new(
        max_attempts: u32,
        min_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_backoff,
            max_backoff: max_backoff.max(min_backoff),
            backoff_multiplier,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Replaces the jitter bound.
    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the `(min, max)` delay bounds.
    #[must_use]
    pub fn backoff_bounds(&self) -> (Duration, Duration) {
        (self.min_backoff, self.max_backoff)
    }

    /// Determines whether to retry a failed fetch.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - The attempt number that just failed (1-indexed)
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        self.should_retry_with_hint(failure_type, attempt, None)
    }

    /// Like [`should_retry`](Self::should_retry), but a server-provided delay
    /// (Retry-After) replaces the computed backoff when present. The hint is
    /// still clamped into the backoff bounds.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry_with_hint(
        &self,
        failure_type: FailureType,
        attempt: u32,
        server_hint: Option<Duration>,
    ) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::AuthChallenge => {
                return RetryDecision::DoNotRetry {
                    reason: "authentication challenge - requires re-authentication, not retry"
                        .to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = match server_hint {
            Some(hint) => self.clamp(hint),
            None => self.calculate_delay(attempt),
        };

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            server_hint = server_hint.is_some(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Calculates the delay for a retry attempt with exponential backoff and jitter.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.min_backoff.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);

        // attempt 1 = multiplier^0 = 1x base
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_backoff.as_millis() as f64);

        self.clamp(Duration::from_millis(capped_ms as u64) + self.calculate_jitter())
    }

    fn clamp(&self, delay: Duration) -> Duration {
        delay.clamp(self.min_backoff, self.max_backoff)
    }

    /// Generates random jitter between 0 and `max_jitter`.
    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}

/// Classifies a fetch error into a failure type for retry decisions.
///
/// # HTTP Status Code Classification
///
/// | Status | Type | Rationale |
/// |--------|------|-----------|
/// | 401/403 | AuthChallenge | Session rejected (normally surfaced as `AuthChallenge` already) |
/// | 404/410 | Permanent | Item is gone |
/// | 408 | Transient | Request timeout - may succeed |
/// | 429 | RateLimited | Rate limited - retry with backoff |
/// | other 4xx | Permanent | Won't succeed on retry |
/// | 5xx | Transient | Server error - may be temporary |
///
/// # Non-HTTP Errors
///
/// | Error | Type |
/// |-------|------|
/// | Timeout | Transient |
/// | Network (most) | Transient |
/// | Network (TLS) | Permanent |
/// | EmptyBody | Transient |
/// | InvalidUrl | Permanent |
/// | AuthChallenge | AuthChallenge |
#[instrument]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::HttpStatus { status, .. } => classify_http_status(*status),
        FetchError::Timeout { .. } | FetchError::EmptyBody { .. } => FailureType::Transient,
        FetchError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        FetchError::InvalidUrl { .. } => FailureType::Permanent,
        FetchError::AuthChallenge { .. } => FailureType::AuthChallenge,
    }
}

/// Classifies an HTTP status code into a failure type.
#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 | 403 | 407 => FailureType::AuthChallenge,
        404 => FailureType::Permanent, // Not Found
        408 => FailureType::Transient, // Request Timeout
        410 => FailureType::Permanent, // Gone
        429 => FailureType::RateLimited,
        status if (400..500).contains(&status) => FailureType::Permanent,
        status if (500..600).contains(&status) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Words marking a TLS or certificate failure in an error message.
const TLS_MARKERS: &[&str] = &["certificate", "tls", "ssl", "handshake"];

/// Checks if a reqwest error is a TLS/certificate error.
///
/// Only the underlying causes are inspected; the top-level message embeds the
/// request URL, which may contain any of the marker words.
fn is_tls_error(error: &reqwest::Error) -> bool {
    std::error::Error::source(error).is_some_and(chain_mentions_tls)
}

fn chain_mentions_tls(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut cause = Some(error);
    while let Some(current) = cause {
        let message = current.to_string().to_lowercase();
        if TLS_MARKERS.iter().any(|marker| message.contains(marker)) {
            return true;
        }
        cause = current.source();
    }
    false
}
