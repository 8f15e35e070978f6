//! Atomic item writer.
//!
//! Content is written to a hidden temp file next to the destination, flushed
//! and synced, then renamed over the canonical name. A crash at any point
//! leaves either no file or a complete one under the canonical name; a stray
//! temp file never matches the inventory pattern.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rand::Rng;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};

use super::error::WriteError;
use crate::inventory::canonical_filename;

/// Suffix of in-progress temp files.
const PARTIAL_SUFFIX: &str = "partial";

/// Writes items into one storage directory.
#[derive(Debug, Clone)]
pub struct ItemWriter {
    dir: PathBuf,
    extension: String,
}

impl ItemWriter {
    /// Creates a writer for `dir` producing `item_YYYY-MM-DD.<extension>`.
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// The storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final path of the item for `date`.
    #[must_use]
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(canonical_filename(date, &self.extension))
    }

    /// Persists `content` as the item for `date`, replacing any previous file.
    ///
    /// The storage directory is created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError`] classified from the underlying I/O error. The
    /// temp file is removed on failure and the destination is left untouched.
    #[instrument(skip(self, content), fields(date = %date, bytes = content.len()))]
    pub async fn persist(&self, date: NaiveDate, content: &str) -> Result<PathBuf, WriteError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| WriteError::from_io(&self.dir, e))?;

        let final_path = self.path_for(date);
        let temp_path = self.temp_path_for(date);

        if let Err(error) = write_synced(&temp_path, content.as_bytes()).await {
            remove_temp(&temp_path).await;
            return Err(error);
        }

        if let Err(error) = tokio::fs::rename(&temp_path, &final_path).await {
            remove_temp(&temp_path).await;
            return Err(WriteError::from_io(&final_path, error));
        }

        debug!(path = %final_path.display(), "item persisted");
        Ok(final_path)
    }

    /// Hidden, uniquely named sibling of the final path.
    fn temp_path_for(&self, date: NaiveDate) -> PathBuf {
        let nonce: u32 = rand::thread_rng().r#gen();
        self.dir.join(format!(
            ".{}.{nonce:08x}.{PARTIAL_SUFFIX}",
            canonical_filename(date, &self.extension)
        ))
    }
}

/// Writes and syncs `bytes` to a new file at `path`. The handle is closed on
/// every exit path when it goes out of scope.
async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let file = File::create(path)
        .await
        .map_err(|e| WriteError::from_io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(bytes)
        .await
        .map_err(|e| WriteError::from_io(path, e))?;
    writer
        .flush()
        .await
        .map_err(|e| WriteError::from_io(path, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| WriteError::from_io(path, e))
}

async fn remove_temp(path: &Path) {
    if let Err(error) = tokio::fs::remove_file(path).await
        && error.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %error, "failed to remove temp file");
    }
}
