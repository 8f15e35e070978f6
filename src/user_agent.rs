//! Shared User-Agent string for login, catalogue and content requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/catalogue-sync";

/// Default User-Agent used when the configuration does not override it.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("catalogue-sync/{version} (incremental-sync; +{PROJECT_UA_URL})")
}
