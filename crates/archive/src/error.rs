//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist under its root.
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The archive opened fine but holds no usable entry.
    #[display("archive entry not found: {_0}")]
    EntryNotFound(#[error(not(source))] String),
    /// Access denied by the operating system.
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Path contains invalid characters or escapes its root.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Underlying I/O error.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Data is corrupt or malformed: bad archive, bad UTF-8, bad JSON.
    #[display("invalid or corrupted data")]
    InvalidData,
    /// The file extension doesn't name a readable format for this operation.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// An embedded SQLite book could not be opened or queried.
    #[display("embedded database error")]
    Database,
    /// The read didn't finish within the configured bound.
    #[display("archive read timed out")]
    Timeout,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout)
    }

    /// Returns `true` for expected absence (missing file or missing entry).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::EntryNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidData.to_string(), "invalid or corrupted data");
        assert_eq!(ErrorKind::EntryNotFound("*.json".to_string()).to_string(), "archive entry not found: *.json");
        assert_eq!(ErrorKind::UnsupportedFormat("epub".to_string()).to_string(), "unsupported format: epub");
    }

    #[test]
    fn error_kind_classification() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::InvalidData.is_retryable());
        assert!(ErrorKind::NotFound(PathBuf::from("a.zip")).is_not_found());
        assert!(ErrorKind::EntryNotFound("*.json".to_string()).is_not_found());
        assert!(!ErrorKind::Database.is_not_found());
    }

    #[test]
    fn error_from_result() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad zip"));
        let err: Result<()> = result.or_raise(|| ErrorKind::InvalidData);
        assert!(matches!(*err.unwrap_err(), ErrorKind::InvalidData));
    }
}
