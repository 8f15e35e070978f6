//! Politeness pacing between catalogue items.
//!
//! This module provides the [`PolitenessPacer`], which spaces successive item
//! fetches by a random pause drawn from a configured window, and
//! [`parse_retry_after`] for server-mandated delays.
//!
//! # Overview
//!
//! The first item of a run proceeds immediately. Every later item waits until a
//! random delay in `[min_delay, max_delay]` has elapsed since the previous item
//! finished. Time already spent (sanitizing, writing) counts toward the delay.
//!
//! Waiting is cancellable: a cancelled run stops at the pause instead of
//! sleeping it out.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use catalogue_sync_core::download::PolitenessPacer;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let mut pacer = PolitenessPacer::new(Duration::from_millis(10), Duration::from_millis(20));
//! let cancel = CancellationToken::new();
//!
//! // First item proceeds immediately
//! assert!(pacer.wait(&cancel).await);
//! pacer.record_request();
//!
//! // Second item waits 10-20ms
//! assert!(pacer.wait(&cancel).await);
//! # }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::constants::{CUMULATIVE_DELAY_WARNING_THRESHOLD, MAX_RETRY_AFTER};
use crate::config::PolitenessConfig;

/// Randomized spacing between item fetches within one run.
///
/// Owned by the fetch loop; items are processed one at a time so no shared
/// state or locking is involved.
#[derive(Debug)]
pub struct PolitenessPacer {
    /// Shortest pause between items.
    min_delay: Duration,

    /// Longest pause between items.
    max_delay: Duration,

    /// Whether pacing is disabled (zero window).
    disabled: bool,

    /// When the previous item finished.
    /// `None` until the first item has been recorded (first wait is immediate).
    last_request: Option<Instant>,

    /// Total time spent pausing in this run.
    cumulative_delay: Duration,
}

impl PolitenessPacer {
    /// Creates a pacer with the given delay window.
    ///
    /// An inverted window is normalized by swapping the bounds.
    #[must_use]
    #[instrument(skip_all, fields(min_ms = min_delay.as_millis(), max_ms = max_delay.as_millis()))]
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        debug!("creating politeness pacer");
        Self {
            min_delay,
            max_delay,
            disabled: max_delay.is_zero(),
            last_request: None,
            cumulative_delay: Duration::ZERO,
        }
    }

    /// Creates a pacer that never pauses.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Returns whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured `(min, max)` delay window.
    #[must_use]
    pub fn window(&self) -> (Duration, Duration) {
        (self.min_delay, self.max_delay)
    }

    /// Returns the total time this pacer has spent pausing.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        self.cumulative_delay
    }

    /// Waits until the next item may be fetched.
    ///
    /// Returns `false` when `cancel` fired before or during the pause; the
    /// caller should stop starting new items.
    #[instrument(skip(self, cancel))]
    pub async fn wait(&mut self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        if self.disabled {
            return true;
        }

        let Some(last_request) = self.last_request else {
            debug!("first item - no delay");
            return true;
        };

        let target = self.draw_delay();
        let delay = target.saturating_sub(last_request.elapsed());
        if delay.is_zero() {
            return true;
        }

        self.cumulative_delay += delay;
        debug!(
            delay_ms = delay.as_millis(),
            cumulative_ms = self.cumulative_delay.as_millis(),
            "applying politeness delay"
        );
        if self.cumulative_delay >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
            warn!(
                cumulative_delay_secs = self.cumulative_delay.as_secs(),
                "long cumulative politeness delay in this run"
            );
        }

        tokio::select! {
            () = cancel.cancelled() => {
                debug!("cancelled during politeness delay");
                false
            }
            () = tokio::time::sleep(delay) => true,
        }
    }

    /// Records that an item has just finished; the next wait is measured from now.
    pub fn record_request(&mut self) {
        self.last_request = Some(Instant::now());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw_delay(&self) -> Duration {
        let min_ms = self.min_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        if min_ms == max_ms {
            return self.min_delay;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }
}

impl From<&PolitenessConfig> for PolitenessPacer {
    fn from(config: &PolitenessConfig) -> Self {
        Self::new(config.min_delay, config.max_delay)
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports two formats as per RFC 7231:
/// - Integer seconds: `Retry-After: 120`
/// - HTTP-date: `Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`
///
/// Returns `None` if the value cannot be parsed. Caps excessive values at 1 hour.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use catalogue_sync_core::download::pacer::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        return Some(cap_retry_after(Duration::from_secs(seconds)));
    }

    match httpdate::parse_http_date(header_value) {
        Ok(datetime) => match datetime.duration_since(std::time::SystemTime::now()) {
            Ok(duration) => Some(cap_retry_after(duration)),
            Err(_) => {
                debug!(header_value, "Retry-After date is in the past, returning zero");
                Some(Duration::ZERO)
            }
        },
        Err(_) => {
            debug!(header_value, "unparseable Retry-After value");
            None
        }
    }
}

fn cap_retry_after(duration: Duration) -> Duration {
    if duration > MAX_RETRY_AFTER {
        warn!(
            delay_secs = duration.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        return MAX_RETRY_AFTER;
    }
    duration
}
