//! Error types for catalogue and content fetches.
//!
//! Every variant carries the URL it concerns so a failed item's report entry is
//! self-explanatory.

use thiserror::Error;

/// Errors that can occur while fetching a page through the session.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, body read, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response other than an authentication challenge.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429/503 responses).
        retry_after: Option<String>,
    },

    /// The URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The source asked for credentials: 401/403, or a redirect to its login page.
    ///
    /// `status` is 0 when the challenge was a login redirect.
    #[error("authentication challenge (HTTP {status}) fetching {url}")]
    AuthChallenge {
        /// The URL that was challenged.
        url: String,
        /// The HTTP status code, or 0 for a login redirect.
        status: u16,
    },

    /// A 2xx response arrived without a body.
    #[error("empty response body fetching {url}")]
    EmptyBody {
        /// The URL that returned nothing.
        url: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an authentication-challenge error.
    pub fn auth_challenge(url: impl Into<String>, status: u16) -> Self {
        Self::AuthChallenge {
            url: url.into(),
            status,
        }
    }

    /// Creates an empty-body error.
    pub fn empty_body(url: impl Into<String>) -> Self {
        Self::EmptyBody { url: url.into() }
    }

    /// Returns the Retry-After header carried by an HTTP status error.
    #[must_use]
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

// No `From<reqwest::Error>`: every variant needs the URL, which the source
// error does not reliably carry. Use the constructor helpers.
