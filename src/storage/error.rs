//! Persistence error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while persisting an item.
///
/// Recorded against the item's result; never retried and never run-fatal.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The filesystem is out of space.
    #[error("disk full writing {path}")]
    DiskFull {
        /// File being written.
        path: PathBuf,
    },

    /// The process may not write to the storage location.
    #[error("permission denied writing {path}")]
    PermissionDenied {
        /// File being written.
        path: PathBuf,
    },

    /// Any other I/O failure.
    #[error("I/O error writing {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl WriteError {
    /// Classifies an I/O error raised while writing `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::StorageFull => Self::DiskFull { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}
