//! In-memory cookie store for one run's session.
//!
//! Wraps a `reqwest::cookie::Jar` so the session can be discarded on logout
//! without rebuilding the HTTP client. Cookie values are never logged.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use tracing::debug;

/// Cookie store shared between the HTTP client and the session.
#[derive(Default)]
pub struct SessionCookies {
    jar: RwLock<Arc<Jar>>,
}

impl fmt::Debug for SessionCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookies")
            .field("jar", &"[REDACTED]")
            .finish()
    }
}

impl SessionCookies {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cookie.
    pub fn clear(&self) {
        let mut jar = self.jar.write().unwrap_or_else(PoisonError::into_inner);
        *jar = Arc::new(Jar::default());
        debug!("session cookies cleared");
    }

    /// Returns true when at least one cookie would be sent to `url`.
    #[must_use]
    pub fn has_cookies_for(&self, url: &Url) -> bool {
        self.cookies(url).is_some()
    }

    fn current(&self) -> Arc<Jar> {
        Arc::clone(&self.jar.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.current().set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.current().cookies(url)
    }
}
