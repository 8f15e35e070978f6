//! Catalogue parsing errors.

use thiserror::Error;

/// Errors that make a catalogue page untrustworthy.
///
/// All variants are run-fatal; a partially parsed catalogue is never planned
/// against.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// The page has no usable table, or a row lacks the expected structure.
    #[error("malformed catalogue table: {reason}\n  Suggestion: the source layout may have changed")]
    MalformedTable {
        /// What was missing.
        reason: String,
    },

    /// A row's date cell is not a real `DD-MM-YYYY` date.
    #[error("unrecognized date '{token}' (expected DD-MM-YYYY)")]
    UnrecognizedDateFormat {
        /// The offending cell text.
        token: String,
    },

    /// A row's control label is neither a fetchable nor a restricted label.
    #[error("unrecognized access label '{label}' for {date}")]
    UnrecognizedAccessLabel {
        /// The control label text.
        label: String,
        /// The row's date token.
        date: String,
    },
}

impl ParseError {
    /// Creates a `MalformedTable` error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedTable {
            reason: reason.into(),
        }
    }
}
