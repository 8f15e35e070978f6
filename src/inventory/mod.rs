//! Local storage scanning.
//!
//! The storage directory is the only record of what has already been fetched.
//! It is re-read on every run; nothing is cached between runs, so files added
//! or removed by other tools are picked up.

mod filename;

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, instrument, trace};

pub use filename::{ITEM_PREFIX, canonical_filename, parse_canonical_filename};

/// One stored item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalItem {
    /// Item date, from the filename.
    pub date: NaiveDate,
    /// File name inside the storage directory.
    pub filename: String,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// Summary of the stored items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    /// Number of stored items.
    pub total_files: usize,
    /// Earliest stored date.
    pub oldest: Option<NaiveDate>,
    /// Latest stored date.
    pub newest: Option<NaiveDate>,
    /// Calendar days from the oldest to the newest item, both included
    /// (`0` when nothing is stored).
    pub span_days: i64,
}

/// Snapshot of the storage directory, keyed by date.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    items: BTreeMap<NaiveDate, LocalItem>,
}

impl Inventory {
    /// Stored dates, ascending.
    #[must_use]
    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.items.keys().copied().collect()
    }

    /// Returns true when an item for `date` is stored.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.items.contains_key(&date)
    }

    /// Stored item for `date`.
    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Option<&LocalItem> {
        self.items.get(&date)
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stored items, ascending by date.
    pub fn items(&self) -> impl Iterator<Item = &LocalItem> {
        self.items.values()
    }

    /// Count and date range of the stored items.
    #[must_use]
    pub fn stats(&self) -> InventoryStats {
        let oldest = self.items.keys().next().copied();
        let newest = self.items.keys().next_back().copied();
        let span_days = match (oldest, newest) {
            (Some(first), Some(last)) => (last - first).num_days() + 1,
            _ => 0,
        };
        InventoryStats {
            total_files: self.items.len(),
            oldest,
            newest,
            span_days,
        }
    }
}

/// Scanner for one storage directory and item extension.
#[derive(Debug, Clone)]
pub struct LocalInventory {
    dir: PathBuf,
    extension: String,
}

impl LocalInventory {
    /// Creates a scanner for `dir`, matching `item_YYYY-MM-DD.<extension>`.
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// The scanned directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads the directory into an [`Inventory`].
    ///
    /// Only regular files whose names match the canonical pattern count;
    /// everything else (temp files, subdirectories, unrelated files) is
    /// ignored. A directory that does not exist yet is an empty inventory.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the directory exists but cannot be read.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn scan(&self) -> Result<Inventory, io::Error> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("storage directory does not exist yet");
                return Ok(Inventory::default());
            }
            Err(error) => return Err(error),
        };

        let mut inventory = Inventory::default();
        let mut ignored = 0_usize;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(date) = name
                .to_str()
                .and_then(|name| parse_canonical_filename(name, &self.extension))
            else {
                trace!(name = ?name, "ignoring non-item entry");
                ignored += 1;
                continue;
            };

            let Some(metadata) = skip_vanished(entry.metadata().await)? else {
                trace!(name = ?name, "entry removed during scan");
                ignored += 1;
                continue;
            };
            if !metadata.is_file() {
                ignored += 1;
                continue;
            }

            inventory.items.insert(
                date,
                LocalItem {
                    date,
                    filename: name.to_string_lossy().into_owned(),
                    size_bytes: metadata.len(),
                },
            );
        }

        debug!(items = inventory.len(), ignored, "inventory scanned");
        Ok(inventory)
    }
}

/// Maps `NotFound` to `None`: another tool removed the entry after it was listed.
fn skip_vanished<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}
