//! Remote catalogue parsing.
//!
//! Turns the catalogue page fetched through the session into an ordered list
//! of dated [`AvailabilityItem`]s, each classified as fetchable or restricted.

mod error;
mod item;
mod parser;

pub use error::ParseError;
pub use item::{AccessLevel, AvailabilityItem};
pub use parser::{AccessLabels, AvailabilityParser};
