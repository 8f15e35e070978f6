//! Session state machine.
//!
//! ```text
//! Unauthenticated --begin--> Authenticating --success--> Authenticated
//!        ^                         |                        |
//!        +--------failure----------+          ttl elapsed / challenge
//!                                                           v
//!                      Authenticating <--ensure_valid--  Expired
//! ```
//!
//! [`Session`] holds no cookies or credentials; it only records where in the
//! lifecycle the run's login currently is and when it stops being trusted.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No login yet, or the last login failed. Terminal within a run.
    Unauthenticated,
    /// A login exchange is in progress.
    Authenticating,
    /// Logged in and inside the session lifetime.
    Authenticated,
    /// Was logged in, but the lifetime elapsed or the source challenged a request.
    Expired,
}

/// Login state and lifetime of one run's session.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    established_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an unauthenticated session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            established_at: None,
            expires_at: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// When the current login succeeded.
    #[must_use]
    pub fn established_at(&self) -> Option<DateTime<Utc>> {
        self.established_at
    }

    /// When the current login stops being trusted.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true in the `Authenticated` state.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Returns true when authenticated and `now` is before the expiry.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_authenticated() && self.expires_at.is_some_and(|expires| now < expires)
    }

    /// Returns true when the session is valid right now.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Enters `Authenticating`.
    pub(crate) fn begin_authenticating(&mut self) {
        self.state = SessionState::Authenticating;
    }

    /// Enters `Authenticated` with a fresh lifetime starting at `now`.
    pub(crate) fn mark_authenticated(&mut self, now: DateTime<Utc>, ttl: Duration) {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        self.state = SessionState::Authenticated;
        self.established_at = Some(now);
        self.expires_at = Some(now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC));
    }

    /// Moves an authenticated session to `Expired`. Other states are left alone.
    pub(crate) fn mark_expired(&mut self) {
        if self.state == SessionState::Authenticated {
            self.state = SessionState::Expired;
        }
    }

    /// Moves an authenticated session past its lifetime to `Expired`.
    pub(crate) fn expire_if_elapsed(&mut self, now: DateTime<Utc>) {
        if self.is_authenticated() && !self.is_valid_at(now) {
            self.state = SessionState::Expired;
        }
    }

    /// Returns to `Unauthenticated`, forgetting the lifetime.
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    /// Serializable snapshot for reporting.
    #[must_use]
    pub fn info_at(&self, now: DateTime<Utc>) -> SessionInfo {
        SessionInfo {
            state: self.state,
            established_at: self.established_at,
            expires_at: self.expires_at,
            age_secs: self
                .established_at
                .map(|established| (now - established).num_seconds().max(0)),
            valid: self.is_valid_at(now),
        }
    }
}

/// Point-in-time description of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Lifecycle state.
    pub state: SessionState,
    /// When the current login succeeded.
    pub established_at: Option<DateTime<Utc>>,
    /// When the current login expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Seconds since the login, if any.
    pub age_secs: Option<i64>,
    /// Whether the session is usable right now.
    pub valid: bool,
}
