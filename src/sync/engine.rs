//! Run orchestrator for one synchronization pass.
//!
//! The [`SyncEngine`] ties the pieces together in a fixed order: make sure the
//! session is signed in, fetch and parse the catalogue, scan local storage,
//! compute the plan, then fetch the missing items one at a time and
//! summarize the outcome.
//!
//! # Example
//!
//! ```no_run
//! use catalogue_sync_core::{Credentials, SyncConfig, sync_once};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::new("https://source.example", "./items");
//! let credentials = Credentials::new("me@example.com", "secret");
//! let report = sync_once(config, credentials, &CancellationToken::new()).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::planner::{SyncPlan, compute_plan};
use crate::auth::{AuthSession, SessionState};
use crate::catalogue::AvailabilityParser;
use crate::config::{Credentials, SyncConfig};
use crate::download::Fetcher;
use crate::error::SyncError;
use crate::inventory::LocalInventory;
use crate::report::{Report, summarize};
use crate::storage::ItemWriter;

/// Coordinates one or more sync runs against a single source and directory.
#[derive(Debug)]
pub struct SyncEngine {
    config: SyncConfig,
    parser: AvailabilityParser,
    inventory: LocalInventory,
    writer: ItemWriter,
    fetcher: Fetcher,
}

impl SyncEngine {
    /// Creates an engine for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] when the configuration is invalid.
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self {
            parser: AvailabilityParser::new(&config.source),
            inventory: LocalInventory::new(&config.storage_dir, &config.file_extension),
            writer: ItemWriter::new(&config.storage_dir, &config.file_extension),
            fetcher: Fetcher::from_config(&config),
            config,
        })
    }

    /// Replaces the catalogue parser, e.g. to use custom access labels.
    #[must_use]
    pub fn with_parser(mut self, parser: AvailabilityParser) -> Self {
        self.parser = parser;
        self
    }

    /// The configuration the engine was built from.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Signs in if needed, then reads the catalogue and storage into a plan.
    ///
    /// Nothing is written. Calling this on its own gives a dry-run preview.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Auth`] when login or re-login fails
    /// - [`SyncError::Catalogue`] when the catalogue page cannot be fetched
    /// - [`SyncError::Parse`] when the catalogue page cannot be understood
    /// - [`SyncError::Inventory`] when the storage directory cannot be read
    #[instrument(skip_all, fields(catalogue_url = %self.config.source.catalogue_url()))]
    pub async fn plan(&self, session: &mut AuthSession) -> Result<SyncPlan, SyncError> {
        if session.session().state() == SessionState::Unauthenticated {
            session.authenticate().await?;
        } else {
            session.ensure_valid().await?;
        }

        let catalogue_url = self.config.source.catalogue_url();
        let attempt = self
            .fetcher
            .fetch_with_retry(&catalogue_url, session)
            .await?;
        let page = attempt.content.map_err(SyncError::Catalogue)?;
        let available = self.parser.parse(&page)?;

        let local = self
            .inventory
            .scan()
            .await
            .map_err(|source| SyncError::inventory(self.inventory.dir(), source))?;

        Ok(compute_plan(&available, &local.dates()))
    }

    /// Runs one full synchronization pass.
    ///
    /// The session is left signed in; call [`AuthSession::invalidate`] when
    /// done, or use [`sync_once`] which does it for you.
    ///
    /// # Errors
    ///
    /// Everything [`plan`](Self::plan) returns, plus [`SyncError::Auth`] when
    /// the session cannot be recovered mid-run. Items stored before such an
    /// abort stay on disk. Per-item failures are reported, not returned.
    #[instrument(skip_all, fields(storage_dir = %self.config.storage_dir.display()))]
    pub async fn run(
        &mut self,
        session: &mut AuthSession,
        cancel: &CancellationToken,
    ) -> Result<Report, SyncError> {
        let plan = self.plan(session).await?;
        info!(
            total = plan.total_items(),
            to_fetch = plan.to_fetch.len(),
            already_present = plan.already_present.len(),
            skipped_restricted = plan.skipped_restricted.len(),
            "sync plan ready"
        );

        let run = self
            .fetcher
            .fetch_all(&plan.to_fetch, session, &self.writer, cancel)
            .await?;

        let mut report = summarize(&plan, &run.results);
        report.cancelled = run.cancelled;
        if report.failed_count > 0 {
            warn!(failed = report.failed_count, "sync finished with failures");
        }
        info!(
            fetched = report.fetched_count,
            failed = report.failed_count,
            cancelled = report.cancelled,
            "sync finished"
        );
        Ok(report)
    }
}

/// Builds a session and an engine, runs once and always invalidates the session.
///
/// # Errors
///
/// See [`SyncEngine::run`]. Client construction failures surface as
/// [`SyncError::Auth`].
#[instrument(skip_all, fields(base_url = %config.source.base_url))]
pub async fn sync_once(
    config: SyncConfig,
    credentials: Credentials,
    cancel: &CancellationToken,
) -> Result<Report, SyncError> {
    let mut engine = SyncEngine::new(config)?;
    let mut session = AuthSession::from_config(engine.config(), credentials)?;
    let result = engine.run(&mut session, cancel).await;
    session.invalidate().await;
    result
}
