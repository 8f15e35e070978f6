//! Atomic persistence of sanitized items under canonical filenames.

mod error;
mod writer;

pub use error::WriteError;
pub use writer::ItemWriter;
