//! Login, re-login and logout against the gated source.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use reqwest::header::REFERER;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::cookies::SessionCookies;
use super::error::AuthError;
use super::session::{Session, SessionInfo, SessionState};
use crate::config::{Credentials, SourceEndpoints, SyncConfig};
use crate::download::build_http_client;
use crate::markup::text_content;

/// Page text that means the login did not go through.
const FAILURE_MARKERS: &[&str] = &[
    "error de autenticación",
    "credenciales incorrectas",
    "invalid credentials",
    "login failed",
];

/// Page text that only appears for a signed-in account.
const SIGNED_IN_MARKERS: &[&str] = &["cerrar sesión", "mi cuenta", "logout"];

/// JSON answer of the login endpoint.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    alert: Option<String>,
}

/// The authenticated session of one run: HTTP client, cookies, credentials
/// and lifecycle state.
///
/// All requests of the run go through [`http`](Self::http) so login cookies
/// are attached automatically.
#[derive(Debug)]
pub struct AuthSession {
    client: Client,
    cookies: Arc<SessionCookies>,
    endpoints: SourceEndpoints,
    credentials: Credentials,
    ttl: Duration,
    login_delay: Duration,
    session: Session,
}

impl AuthSession {
    /// Creates an unauthenticated session for the configured source.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClientSetup`] when the HTTP client cannot be built.
    pub fn from_config(config: &SyncConfig, credentials: Credentials) -> Result<Self, AuthError> {
        let cookies = Arc::new(SessionCookies::new());
        let client = build_http_client(Arc::clone(&cookies), &config.http)
            .map_err(|source| AuthError::ClientSetup { source })?;
        Ok(Self {
            client,
            cookies,
            endpoints: config.source.clone(),
            credentials,
            ttl: config.session.ttl,
            login_delay: config.session.login_delay,
            session: Session::new(),
        })
    }

    /// The HTTP client carrying this session's cookies.
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Current lifecycle state and lifetime.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Serializable snapshot of the session.
    #[must_use]
    pub fn session_info(&self) -> SessionInfo {
        self.session.info_at(Utc::now())
    }

    /// Endpoints of the source this session logs into.
    #[must_use]
    pub fn endpoints(&self) -> &SourceEndpoints {
        &self.endpoints
    }

    /// Logs in, replacing any previous session.
    ///
    /// On failure the session is left `Unauthenticated` with no cookies.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] for blank credentials (no request is
    ///   sent), a 401/403 from the login endpoint, or a refused login
    /// - [`AuthError::Timeout`] when any login request times out
    /// - [`AuthError::RemoteRejected`] for other failed or unrecognizable answers
    #[instrument(skip(self), fields(login_url = %self.endpoints.login_url()))]
    pub async fn authenticate(&mut self) -> Result<(), AuthError> {
        if !self.credentials.is_complete() {
            self.session.reset();
            return Err(AuthError::invalid_credentials(
                "e-mail and password are required",
            ));
        }

        self.session.begin_authenticating();
        match self.login().await {
            Ok(()) => {
                self.session.mark_authenticated(Utc::now(), self.ttl);
                info!(ttl_secs = self.ttl.as_secs(), "authenticated");
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "authentication failed");
                self.cookies.clear();
                self.session.reset();
                Err(error)
            }
        }
    }

    /// Makes sure the session is usable, logging in again once if it expired.
    ///
    /// A session past its lifetime is first moved to `Expired`. An `Expired`
    /// session triggers one login; if that fails the session ends up
    /// `Unauthenticated` and later calls fail fast.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] when there is nothing to
    /// refresh, or the error of the re-login.
    #[instrument(skip(self))]
    pub async fn ensure_valid(&mut self) -> Result<(), AuthError> {
        self.session.expire_if_elapsed(Utc::now());
        match self.session.state() {
            SessionState::Authenticated => Ok(()),
            SessionState::Expired => {
                info!("session expired, re-authenticating");
                self.authenticate().await
            }
            SessionState::Unauthenticated | SessionState::Authenticating => {
                Err(AuthError::NotAuthenticated)
            }
        }
    }

    /// Records that the source challenged a request made with this session.
    pub fn mark_expired(&mut self) {
        self.session.mark_expired();
    }

    /// Logs out (best effort), drops the cookies and resets the state.
    #[instrument(skip(self))]
    pub async fn invalidate(&mut self) {
        if matches!(
            self.session.state(),
            SessionState::Authenticated | SessionState::Expired
        ) {
            let logout_url = self.endpoints.logout_url();
            match self.client.get(&logout_url).send().await {
                Ok(response) => debug!(status = response.status().as_u16(), "logged out"),
                Err(error) => debug!(error = %error, "logout request failed"),
            }
        }
        self.cookies.clear();
        self.session.reset();
        info!("session invalidated");
    }

    async fn login(&self) -> Result<(), AuthError> {
        let home_url = self.home_url();
        let home = self
            .client
            .get(&home_url)
            .send()
            .await
            .map_err(|e| transport_error(&home_url, &e))?;
        if !home.status().is_success() {
            return Err(AuthError::remote_rejected(format!(
                "home page returned HTTP {}",
                home.status().as_u16()
            )));
        }

        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }

        let login_url = self.endpoints.login_url();
        let form = [
            ("login-email", self.credentials.email.as_str()),
            ("login-password", self.credentials.password.as_str()),
            ("login-redirect", ""),
        ];
        let response = self
            .client
            .post(&login_url)
            .form(&form)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(REFERER, self.endpoints.base())
            .send()
            .await
            .map_err(|e| transport_error(&login_url, &e))?;

        let status = response.status().as_u16();
        if matches!(status, 401 | 403) {
            return Err(AuthError::invalid_credentials(format!(
                "login endpoint returned HTTP {status}"
            )));
        }
        if !response.status().is_success() {
            return Err(AuthError::remote_rejected(format!(
                "login endpoint returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&login_url, &e))?;

        match serde_json::from_str::<LoginResponse>(&body) {
            Ok(answer) if answer.success => Ok(()),
            Ok(answer) => {
                let reason = answer
                    .alert
                    .map(|alert| text_content(&alert))
                    .filter(|alert| !alert.is_empty())
                    .unwrap_or_else(|| "login refused".to_string());
                Err(AuthError::invalid_credentials(reason))
            }
            Err(_) => {
                debug!("login answer is not JSON, probing home page");
                self.probe_signed_in().await
            }
        }
    }

    async fn probe_signed_in(&self) -> Result<(), AuthError> {
        let home_url = self.home_url();
        let page = self
            .client
            .get(&home_url)
            .send()
            .await
            .map_err(|e| transport_error(&home_url, &e))?
            .text()
            .await
            .map_err(|e| transport_error(&home_url, &e))?
            .to_lowercase();

        if let Some(marker) = FAILURE_MARKERS.iter().find(|m| page.contains(*m)) {
            return Err(AuthError::invalid_credentials(format!(
                "source reported \"{marker}\""
            )));
        }
        if let Some(marker) = SIGNED_IN_MARKERS.iter().find(|m| page.contains(*m)) {
            debug!(marker, "signed-in marker found");
            return Ok(());
        }
        Err(AuthError::remote_rejected(
            "no signed-in marker found after login",
        ))
    }

    fn home_url(&self) -> String {
        format!("{}/", self.endpoints.base())
    }
}

fn transport_error(url: &str, error: &reqwest::Error) -> AuthError {
    if error.is_timeout() {
        AuthError::timeout(url)
    } else {
        AuthError::remote_rejected(format!("request to {url} failed: {error}"))
    }
}
