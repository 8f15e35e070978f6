//! Run summary for the caller.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::download::FetchResult;
use crate::sync::SyncPlan;

/// A planned item that did not end up on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDate {
    /// Catalogue date of the item.
    pub date: NaiveDate,
    /// Last error recorded for the item.
    pub error: String,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Items listed in the catalogue.
    pub total_items: usize,
    /// Catalogue items the account may fetch.
    pub fetchable_count: usize,
    /// Catalogue items that require a higher access level.
    pub restricted_count: usize,
    /// Fetchable items that were already stored before the run.
    pub already_present_count: usize,
    /// Items fetched and stored during the run.
    pub fetched_count: usize,
    /// Items whose fetch or write failed.
    pub failed_count: usize,
    /// Failed items with their last error, in processing order.
    pub failed_dates: Vec<FailedDate>,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

impl Report {
    /// Planned items that were never attempted (only non-zero after cancellation).
    #[must_use]
    pub fn not_attempted(&self) -> usize {
        self.fetchable_count
            .saturating_sub(self.already_present_count + self.fetched_count + self.failed_count)
    }

    /// Returns true when every planned item was stored.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed_count == 0 && self.not_attempted() == 0
    }
}

/// Aggregates a plan and the per-item results into a [`Report`].
///
/// Pure counting; `cancelled` is left `false` for the caller to set.
#[must_use]
pub fn summarize(plan: &SyncPlan, results: &[FetchResult]) -> Report {
    let failed_dates: Vec<FailedDate> = results
        .iter()
        .filter(|result| !result.is_success())
        .map(|result| FailedDate {
            date: result.date,
            error: result
                .last_error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        })
        .collect();

    Report {
        total_items: plan.total_items(),
        fetchable_count: plan.fetchable_count(),
        restricted_count: plan.skipped_restricted.len(),
        already_present_count: plan.already_present.len(),
        fetched_count: results.iter().filter(|result| result.is_success()).count(),
        failed_count: failed_dates.len(),
        failed_dates,
        cancelled: false,
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Catalogue: {} items ({} fetchable, {} restricted)",
            self.total_items, self.fetchable_count, self.restricted_count
        )?;
        write!(
            f,
            "Already present: {}, fetched: {}, failed: {}",
            self.already_present_count, self.fetched_count, self.failed_count
        )?;
        if self.cancelled {
            write!(f, " (cancelled, {} not attempted)", self.not_attempted())?;
        }
        for failed in &self.failed_dates {
            write!(f, "\n  {}: {}", failed.date, failed.error)?;
        }
        Ok(())
    }
}
