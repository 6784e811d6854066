//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A configuration source exists but could not be read or parsed.
    #[display("failed to load configuration")]
    Load,
    /// A value was read but is not usable.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// A settings or session file could not be written.
    #[display("failed to write {}", _0.display())]
    Save(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Save(_))
    }
}
