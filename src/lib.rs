//! Catalogue Sync Core Library
//!
//! This library implements an authenticated, incremental synchronization pass
//! against a gated source: it signs in, reads the remote catalogue of dated
//! items, compares it with what is already stored locally, and fetches only the
//! missing items the account is allowed to see.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - Login, session lifetime and re-authentication
//! - [`catalogue`] - Catalogue page parsing into dated items
//! - [`inventory`] - Local storage scanning (the source of truth for "already fetched")
//! - [`sync`] - Fetch planning and the run orchestrator
//! - [`download`] - Retried, politeness-paced HTTP fetching
//! - [`sanitize`] - Markup cleanup before persistence
//! - [`storage`] - Atomic persistence under canonical filenames
//! - [`report`] - Run summary for the caller
//! - [`config`] - Explicit run configuration and credentials

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod catalogue;
pub mod config;
pub mod download;
pub mod error;
pub mod inventory;
mod markup;
pub mod report;
pub mod sanitize;
pub mod storage;
pub mod sync;
mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use auth::{AuthError, AuthSession, Session, SessionInfo, SessionState};
pub use catalogue::{AccessLevel, AccessLabels, AvailabilityItem, AvailabilityParser, ParseError};
pub use config::{
    ConfigError, Credentials, HttpConfig, PolitenessConfig, RetryConfig, SessionConfig,
    SourceEndpoints, SyncConfig,
};
pub use download::{
    DEFAULT_MAX_RETRIES, FailureType, FetchError, FetchOutcome, FetchResult, FetchRun, Fetcher,
    PolitenessPacer, RetryDecision, RetryPolicy, classify_error,
};
pub use error::SyncError;
pub use inventory::{Inventory, InventoryStats, LocalInventory, LocalItem};
pub use report::{FailedDate, Report, summarize};
pub use sanitize::sanitize;
pub use storage::{ItemWriter, WriteError};
pub use sync::{SyncEngine, SyncPlan, compute_plan, sync_once};
