//! Authentication and session lifecycle.
//!
//! This module logs into the gated source, tracks how long the login can be
//! trusted, re-authenticates once when a request is challenged, and logs out
//! at the end of a run. Credentials are supplied by the caller and never
//! persisted or logged.

mod client;
mod cookies;
mod error;
mod session;

pub use client::AuthSession;
pub use cookies::SessionCookies;
pub use error::AuthError;
pub use session::{Session, SessionInfo, SessionState};
