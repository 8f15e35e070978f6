//! Authentication error types.

use thiserror::Error;

/// Errors raised while establishing or re-establishing a session.
///
/// Every variant is run-fatal: a run never continues without a session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The source refused the credentials, or they were incomplete.
    #[error("invalid credentials: {reason}")]
    InvalidCredentials {
        /// Explanation from the source, or why the credentials were not sent.
        reason: String,
    },

    /// The source answered, but not with a usable session.
    #[error("login rejected by source: {reason}")]
    RemoteRejected {
        /// What went wrong.
        reason: String,
    },

    /// The login exchange timed out.
    #[error("login timed out at {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The session is in its terminal unauthenticated state.
    ///
    /// Returned by [`AuthSession::ensure_valid`](super::AuthSession::ensure_valid)
    /// before the first login, or after a re-login has already failed.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientSetup {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl AuthError {
    /// Creates an invalid-credentials error.
    pub fn invalid_credentials(reason: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            reason: reason.into(),
        }
    }

    /// Creates a remote-rejected error.
    pub fn remote_rejected(reason: impl Into<String>) -> Self {
        Self::RemoteRejected {
            reason: reason.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }
}
