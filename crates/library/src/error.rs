//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Each variant names the subsystem
//! that failed; the subsystem's own error sits below it in the tree.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Content was requested before a book was opened.
    #[display("no book selected")]
    NoBookSelected,
    /// `select_book` was given an index outside the available books.
    #[display("no book at index {_0}")]
    NoSuchBook(#[error(not(source))] usize),
    /// A book file, or the entry inside its archive, does not exist.
    #[display("book data not found")]
    NotFound,
    /// A book file exists but could not be read or decoded.
    #[display("failed to read book data")]
    Archive,
    /// The local store failed.
    #[display("local store error")]
    Store,
    /// A remote call whose failure the caller has to know about failed.
    #[display("remote backend error")]
    Remote,
    /// Signing in, signing up or signing out was refused; the message is
    /// the backend's, fit to show the user.
    #[display("{_0}")]
    Auth(#[error(not(source))] String),
    /// Settings or the saved session could not be read or written.
    #[display("failed to persist settings")]
    Settings,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote | Self::Store)
    }
}
