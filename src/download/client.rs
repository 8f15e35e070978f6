//! HTTP client construction and single-page retrieval.
//!
//! Every request of a run (login, catalogue, content) goes through one
//! [`reqwest::Client`] built here, so the session cookies captured at login are
//! attached to later requests automatically.

use std::sync::Arc;

use reqwest::Client;
use reqwest::cookie::CookieStore;
use reqwest::header::RETRY_AFTER;
use tracing::{debug, instrument};
use url::Url;

use super::error::FetchError;
use crate::config::HttpConfig;
use crate::user_agent;

/// Common URL patterns indicating a login redirect.
const LOGIN_PATTERNS: &[&str] = &[
    "/login",
    "/signin",
    "/sign-in",
    "/auth/",
    "/sso",
    "/acceso",
    "/iniciar-sesion",
];

/// Builds the HTTP client for one run.
///
/// The client carries the given cookie store, follows redirects, and applies
/// the configured timeouts and User-Agent.
///
/// # Errors
///
/// Returns the builder error when the TLS backend or proxy settings cannot be
/// initialized.
#[instrument(level = "debug", skip(cookie_store))]
pub fn build_http_client<C>(
    cookie_store: Arc<C>,
    config: &HttpConfig,
) -> Result<Client, reqwest::Error>
where
    C: CookieStore + 'static,
{
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(user_agent::default_user_agent);
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .gzip(true)
        .user_agent(user_agent)
        .cookie_provider(cookie_store)
        .build()
}

/// Fetches one page and returns its body as text.
///
/// Status handling:
/// - 401/403/407 become [`FetchError::AuthChallenge`]
/// - other non-2xx become [`FetchError::HttpStatus`] (with Retry-After when sent)
/// - a 2xx that landed on a login page after redirects becomes
///   [`FetchError::AuthChallenge`] with status 0
/// - a 2xx with an empty body becomes [`FetchError::EmptyBody`]
///
/// # Errors
///
/// Returns [`FetchError`] for any of the conditions above, for an unparseable
/// URL, and for transport failures.
#[instrument(skip(client), fields(url = %url))]
pub async fn get_page(client: &Client, url: &str) -> Result<String, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

    let response = client.get(parsed.clone()).send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::timeout(url)
        } else {
            FetchError::network(url, e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let status_code = status.as_u16();
        if matches!(status_code, 401 | 403 | 407) {
            debug!(status = status_code, "authentication challenge");
            return Err(FetchError::auth_challenge(url, status_code));
        }
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        return Err(FetchError::http_status_with_retry_after(
            url,
            status_code,
            retry_after,
        ));
    }

    if is_login_redirect(&parsed, response.url()) {
        debug!(response_url = %response.url(), "login redirect detected");
        return Err(FetchError::auth_challenge(url, 0));
    }

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::timeout(url)
        } else {
            FetchError::network(url, e)
        }
    })?;

    if body.trim().is_empty() {
        return Err(FetchError::empty_body(url));
    }

    debug!(bytes = body.len(), "page fetched");
    Ok(body)
}

/// Returns true when the request was redirected onto a login page.
///
/// A page requested directly is never flagged, even if its own path matches a
/// login pattern.
fn is_login_redirect(requested: &Url, landed: &Url) -> bool {
    if requested.path() == landed.path() && requested.host_str() == landed.host_str() {
        return false;
    }
    let landed_path = landed.path().to_lowercase();
    LOGIN_PATTERNS
        .iter()
        .any(|pattern| landed_path.contains(pattern))
}
