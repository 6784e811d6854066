//! Client for the hosted backend.
//!
//! The backend provides three services, all reached through a
//! [`RemoteBackend`](backend::RemoteBackend):
//!
//! - **auth**: email/password and third-party sign-in, held as an in-memory
//!   session,
//! - **tables**: the `books` catalog, one content table per book code, and
//!   the user's `highlights` and `notes`,
//! - **storage**: zipped tables of contents (`toc_<code>.json.zip`).
//!
//! [`RemoteClient`] wraps a backend with timeouts and the failure policy the
//! rest of the application relies on.

pub mod backend;
mod client;
pub mod error;
mod models;

pub use crate::backend::RemoteBackend;
pub use crate::client::{BackendHandle, RemoteClient};
pub use crate::models::{AuthInfo, Session, User};
