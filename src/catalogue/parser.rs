//! Catalogue page parsing.
//!
//! The catalogue is an HTML table (often inside a modal container) with one
//! row per date. The first cell carries the date as `DD-MM-YYYY`; another cell
//! carries a link or button whose label tells whether the account may open the
//! item.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, instrument, trace};
use url::Url;

use super::error::ParseError;
use super::item::{AccessLevel, AvailabilityItem};
use crate::config::SourceEndpoints;
use crate::markup::{absolutize_url, compile_static_regex, text_content};

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<table\b[^>]*>(.*?)</table\s*>"));
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>"));
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<t([dh])\b[^>]*>(.*?)</t[dh]\s*>"));
static CONTROL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?is)<(a|button)\b([^>]*)>(.*?)</(?:a|button)\s*>")
});
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)\b(?:href|data-href)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
});
static DATE_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^\d{2}-\d{2}-\d{4}$"));

/// Control labels that classify a row.
///
/// Matching is case-insensitive substring matching. Restricted labels are
/// checked first, so a label containing both kinds is treated as restricted.
#[derive(Debug, Clone)]
pub struct AccessLabels {
    /// Labels of rows the account may fetch.
    pub fetchable: Vec<String>,
    /// Labels of rows behind a higher access level.
    pub restricted: Vec<String>,
}

impl Default for AccessLabels {
    fn default() -> Self {
        Self {
            fetchable: vec!["TEST".to_string()],
            restricted: vec!["LOGIN".to_string(), "PREMIUM".to_string()],
        }
    }
}

impl AccessLabels {
    fn classify(&self, label: &str) -> Option<AccessLevel> {
        let upper = label.to_uppercase();
        let contains_any =
            |needles: &[String]| needles.iter().any(|n| upper.contains(&n.to_uppercase()));
        if contains_any(&self.restricted) {
            Some(AccessLevel::Restricted)
        } else if contains_any(&self.fetchable) {
            Some(AccessLevel::Fetchable)
        } else {
            None
        }
    }
}

/// One table row, split into its pieces.
struct RawRow<'a> {
    /// Inner markup of each `<td>`/`<th>`, with whether it was a header cell.
    cells: Vec<(bool, &'a str)>,
}

impl<'a> RawRow<'a> {
    fn split(row_html: &'a str) -> Self {
        let cells = CELL_RE
            .captures_iter(row_html)
            .filter_map(|caps| {
                let is_header = caps.get(1)?.as_str().eq_ignore_ascii_case("h");
                Some((is_header, caps.get(2)?.as_str()))
            })
            .collect();
        Self { cells }
    }

    fn is_data_row(&self) -> bool {
        self.cells.len() >= 2 && self.cells.iter().any(|(is_header, _)| !is_header)
    }

    fn date_token(&self) -> String {
        self.cells
            .first()
            .map(|(_, cell)| text_content(cell))
            .unwrap_or_default()
    }

    fn is_dated(&self) -> bool {
        DATE_SHAPE_RE.is_match(&self.date_token())
    }

    /// First control with a non-empty label in any cell after the date:
    /// `(attributes, label)`.
    fn control(&self) -> Option<(&'a str, String)> {
        self.cells.iter().skip(1).find_map(|&(_, cell)| {
            CONTROL_RE.captures_iter(cell).find_map(|caps| {
                let label = text_content(caps.get(3)?.as_str());
                (!label.is_empty()).then(|| (caps.get(2).map_or("", |m| m.as_str()), label))
            })
        })
    }
}

/// Parses catalogue pages into [`AvailabilityItem`]s.
#[derive(Debug, Clone)]
pub struct AvailabilityParser {
    endpoints: SourceEndpoints,
    base_url: Option<Url>,
    labels: AccessLabels,
}

impl AvailabilityParser {
    /// Creates a parser resolving links against the source's base URL.
    #[must_use]
    pub fn new(endpoints: &SourceEndpoints) -> Self {
        let base_url = Url::parse(&format!("{}/", endpoints.base())).ok();
        Self {
            endpoints: endpoints.clone(),
            base_url,
            labels: AccessLabels::default(),
        }
    }

    /// Replaces the control labels used for classification.
    #[must_use]
    pub fn with_labels(mut self, labels: AccessLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Parses a catalogue page.
    ///
    /// The catalogue table is the first table with a dated row that holds a
    /// link or button. Header rows and caption rows (fewer than two
    /// cells) are skipped. Items come back in page order, one per date; when a
    /// date repeats, the last row's data replaces the first row's entry in
    /// place.
    ///
    /// # Errors
    ///
    /// - [`ParseError::MalformedTable`] when no catalogue table is found, or a
    ///   data row has no control
    /// - [`ParseError::UnrecognizedDateFormat`] when a data row's first cell is
    ///   not a valid `DD-MM-YYYY` date
    /// - [`ParseError::UnrecognizedAccessLabel`] when a control label matches
    ///   neither label set
    #[instrument(skip(self, markup), fields(markup_len = markup.len()))]
    pub fn parse(&self, markup: &str) -> Result<Vec<AvailabilityItem>, ParseError> {
        let Some(rows) = find_catalogue_rows(markup) else {
            return Err(ParseError::malformed(
                "no table with item controls found on the catalogue page",
            ));
        };

        let mut items: Vec<AvailabilityItem> = Vec::with_capacity(rows.len());
        let mut positions: HashMap<NaiveDate, usize> = HashMap::new();

        for row in rows {
            let item = self.parse_row(&row)?;
            trace!(date = %item.date, access = ?item.access, "catalogue row");
            if let Some(&index) = positions.get(&item.date) {
                debug!(date = %item.date, "duplicate catalogue date, keeping last row");
                items[index] = item;
            } else {
                positions.insert(item.date, items.len());
                items.push(item);
            }
        }

        debug!(items = items.len(), "catalogue parsed");
        Ok(items)
    }

    fn parse_row(&self, row: &RawRow<'_>) -> Result<AvailabilityItem, ParseError> {
        let token = row.date_token();
        let date = parse_catalogue_date(&token)?;

        let Some((attributes, label)) = row.control() else {
            return Err(ParseError::malformed(format!(
                "row {token} has no link or button"
            )));
        };

        let access = self
            .labels
            .classify(&label)
            .ok_or_else(|| ParseError::UnrecognizedAccessLabel {
                label: label.clone(),
                date: token.clone(),
            })?;

        let source_url = self
            .href(attributes)
            .unwrap_or_else(|| self.endpoints.fallback_content_url(date));

        Ok(AvailabilityItem {
            date,
            access,
            source_url,
        })
    }

    fn href(&self, attributes: &str) -> Option<String> {
        let caps = HREF_RE.captures(attributes)?;
        let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
        match &self.base_url {
            Some(base) => absolutize_url(raw, base),
            None => Url::parse(raw.trim()).ok().map(|url| url.to_string()),
        }
    }
}

/// Returns the data rows of the catalogue table.
///
/// That is the first table with a row pairing a `DD-MM-YYYY`-shaped first cell
/// with a control, so navigation and layout tables earlier on the page are
/// passed over. When no table has such a row, the first table with any
/// control is used and its rows fail date parsing with the offending token.
fn find_catalogue_rows(markup: &str) -> Option<Vec<RawRow<'_>>> {
    let tables: Vec<Vec<RawRow<'_>>> = TABLE_RE
        .captures_iter(markup)
        .filter_map(|table| table.get(1))
        .map(|body| {
            ROW_RE
                .captures_iter(body.as_str())
                .filter_map(|row| row.get(1).map(|m| RawRow::split(m.as_str())))
                .filter(RawRow::is_data_row)
                .collect()
        })
        .collect();

    let index = tables
        .iter()
        .position(|rows| rows.iter().any(|row| row.is_dated() && row.control().is_some()))
        .or_else(|| {
            tables
                .iter()
                .position(|rows| rows.iter().any(|row| row.control().is_some()))
        })?;
    tables.into_iter().nth(index)
}

/// Parses a strict `DD-MM-YYYY` date token.
fn parse_catalogue_date(token: &str) -> Result<NaiveDate, ParseError> {
    if !DATE_SHAPE_RE.is_match(token) {
        return Err(ParseError::UnrecognizedDateFormat {
            token: token.to_string(),
        });
    }
    NaiveDate::parse_from_str(token, "%d-%m-%Y").map_err(|_| ParseError::UnrecognizedDateFormat {
        token: token.to_string(),
    })
}
