//! Canonical item filenames: `item_YYYY-MM-DD.<ext>`.

use chrono::NaiveDate;

/// Prefix shared by every stored item.
pub const ITEM_PREFIX: &str = "item_";

/// Returns the canonical filename for an item date.
///
/// ```
/// use chrono::NaiveDate;
/// use catalogue_sync_core::inventory::canonical_filename;
///
/// let date = NaiveDate::from_ymd_opt(2025, 8, 10).unwrap();
/// assert_eq!(canonical_filename(date, "html"), "item_2025-08-10.html");
/// ```
#[must_use]
pub fn canonical_filename(date: NaiveDate, extension: &str) -> String {
    format!("{ITEM_PREFIX}{}.{extension}", date.format("%Y-%m-%d"))
}

/// Parses a canonical filename back into its date.
///
/// Only the exact pattern matches: hidden temp files, other extensions,
/// different case, extra suffixes and impossible dates all return `None`.
#[must_use]
pub fn parse_canonical_filename(name: &str, extension: &str) -> Option<NaiveDate> {
    let stem = name
        .strip_prefix(ITEM_PREFIX)?
        .strip_suffix(extension)?
        .strip_suffix('.')?;
    let bytes = stem.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}
