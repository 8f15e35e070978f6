//! Run-level errors.
//!
//! Everything here stops a run. Per-item failures never surface as a
//! [`SyncError`]; they are recorded in the [`Report`](crate::Report).

use std::path::PathBuf;

use thiserror::Error;

use crate::auth::AuthError;
use crate::catalogue::ParseError;
use crate::config::ConfigError;
use crate::download::FetchError;

/// A failure that ends the sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Login failed, or re-login after expiry failed.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The catalogue page could not be understood.
    #[error("catalogue parse failed: {0}")]
    Parse(#[from] ParseError),

    /// The catalogue page could not be fetched.
    #[error("catalogue fetch failed: {0}")]
    Catalogue(#[source] FetchError),

    /// The storage directory could not be read.
    #[error("cannot scan storage directory {}: {source}", path.display())]
    Inventory {
        /// Storage directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The run configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Creates an inventory scan error for `path`.
    pub fn inventory(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Inventory {
            path: path.into(),
            source,
        }
    }
}
