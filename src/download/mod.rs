//! Retried, politeness-paced HTTP fetching through the authenticated session.
//!
//! This module turns planned catalogue items into stored files, one item at a
//! time, and also serves the catalogue page fetch for the run orchestrator.
//!
//! # Features
//!
//! - Exponential backoff with jitter, clamped to configured bounds
//! - Randomized politeness pause between distinct items
//! - 401/403 and login redirects surfaced as authentication challenges
//! - Cooperative cancellation between items
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use catalogue_sync_core::{AuthSession, Credentials, Fetcher, ItemWriter, SyncConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::new("https://source.example", "./items");
//! let mut session = AuthSession::from_config(&config, Credentials::new("me@example.com", "pw"))?;
//! session.authenticate().await?;
//!
//! let writer = ItemWriter::new(&config.storage_dir, &config.file_extension);
//! let mut fetcher = Fetcher::from_config(&config);
//! let run = fetcher.fetch_all(&[], &mut session, &writer, &CancellationToken::new()).await?;
//! println!("{} items processed", run.results.len());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod fetcher;
pub mod pacer;
mod retry;

pub use client::{build_http_client, get_page};
pub use error::FetchError;
pub use fetcher::{FetchAttempt, FetchOutcome, FetchResult, FetchRun, Fetcher};
pub use pacer::{PolitenessPacer, parse_retry_after};
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};

// No module-local Result aliases: spell out `Result<T, FetchError>`.
