//! Catalogue item types.

use chrono::NaiveDate;
use serde::Serialize;

/// Access classification of a catalogue row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// The account may fetch this item.
    Fetchable,
    /// The item requires an access level the account does not have.
    Restricted,
}

/// One dated entry of the remote catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityItem {
    /// Catalogue date (parsed from `DD-MM-YYYY`).
    pub date: NaiveDate,
    /// Access classification from the row's control label.
    pub access: AccessLevel,
    /// Absolute URL of the item's content page.
    pub source_url: String,
}

impl AvailabilityItem {
    /// Returns true for items the account may fetch.
    #[must_use]
    pub fn is_fetchable(&self) -> bool {
        self.access == AccessLevel::Fetchable
    }
}
