//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("schema upgrade error")]
    Upgrade,
    /// The database on disk was written by a newer schema than this build knows.
    #[display("stored schema version {found} is newer than {expected}")]
    VersionMismatch { found: i64, expected: u32 },
    /// A record lacks the field its collection is keyed by.
    #[display("record has no usable `{_0}` key")]
    MissingKey(#[error(not(source))] &'static str),
    /// Serialization/deserialization error.
    #[display("invalid stored data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
