//! Remote Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A remote backend error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for remote operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Sign-in, sign-up or sign-out was refused; carries the backend's message
    /// so it can be shown to the user.
    #[display("authentication failed: {_0}")]
    Auth(#[error(not(source))] String),
    /// The request never produced a response (DNS, TLS, connection reset).
    #[display("network error")]
    Network,
    /// The backend answered with a non-success status.
    #[display("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    /// Object or row does not exist.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Response body could not be decoded.
    #[display("invalid response data")]
    InvalidData,
    /// A required identity is missing, e.g. deleting a highlight that was
    /// never assigned a remote id.
    #[display("missing remote identity")]
    MissingId,
    /// The request was refused before it was sent.
    #[display("invalid request: {_0}")]
    InvalidRequest(#[error(not(source))] String),
    /// Backend URL or key is unusable.
    #[display("invalid backend configuration: {_0}")]
    InvalidConfig(#[error(not(source))] String),
    #[display("remote call timed out")]
    Timeout,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network | Self::Timeout => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// The backend refused the access token, usually because it expired.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }

    /// The message worth showing to a user: the backend's own wording when
    /// there is one.
    pub fn message(&self) -> String {
        match self {
            Self::Auth(message) | Self::NotFound(message) | Self::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
