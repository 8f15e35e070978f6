//! Fetch planning: partition the catalogue against the local inventory.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::catalogue::{AccessLevel, AvailabilityItem};

/// Partition of one run's catalogue.
///
/// Every catalogue date lands in exactly one of the three parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    /// Fetchable items missing locally, oldest first.
    pub to_fetch: Vec<AvailabilityItem>,
    /// Fetchable items already stored.
    pub already_present: BTreeSet<NaiveDate>,
    /// Restricted items, whether stored or not.
    pub skipped_restricted: BTreeSet<NaiveDate>,
}

impl SyncPlan {
    /// Number of catalogue items the plan covers.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.to_fetch.len() + self.already_present.len() + self.skipped_restricted.len()
    }

    /// Number of fetchable catalogue items (stored or not).
    #[must_use]
    pub fn fetchable_count(&self) -> usize {
        self.to_fetch.len() + self.already_present.len()
    }

    /// Returns true when there is nothing to fetch.
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.to_fetch.is_empty()
    }
}

/// Builds the plan for a catalogue and the locally stored dates.
///
/// Each item is classified in this order: restricted items are skipped
/// (even when a file for the date exists), stored items are already present,
/// the rest are fetched. The fetch list is sorted by date, oldest first, so an
/// interrupted run closes the oldest gaps first.
///
/// Catalogue dates are expected to be unique, as the parser guarantees; if one
/// repeats, its last occurrence decides the classification.
#[must_use]
#[instrument(skip_all, fields(catalogue = available.len(), local = local.len()))]
pub fn compute_plan(available: &[AvailabilityItem], local: &BTreeSet<NaiveDate>) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for item in available {
        plan.to_fetch.retain(|planned| planned.date != item.date);
        plan.already_present.remove(&item.date);
        plan.skipped_restricted.remove(&item.date);

        if item.access == AccessLevel::Restricted {
            plan.skipped_restricted.insert(item.date);
        } else if local.contains(&item.date) {
            plan.already_present.insert(item.date);
        } else {
            plan.to_fetch.push(item.clone());
        }
    }

    plan.to_fetch.sort_by_key(|item| item.date);

    debug!(
        to_fetch = plan.to_fetch.len(),
        already_present = plan.already_present.len(),
        skipped_restricted = plan.skipped_restricted.len(),
        "plan computed"
    );
    plan
}
