//! Local key/value store for the reader.
//!
//! An SQLite database holding four independent collections:
//!
//! - **content**: cached content rows, keyed by their `id` field.
//! - **highlights**: user highlights, keyed by a store-assigned integer.
//! - **notes**: one note per `toc_url`.
//! - **bookmarks**: one bookmark per `url`.
//!
//! Records are stored as JSON next to their key column, so the collections
//! accept whatever extra fields the application puts on them. The schema
//! version lives in `PRAGMA user_version`; see [`Database`] for the upgrade
//! rules.

mod collections;
mod db;
pub mod error;

pub use crate::collections::{Bookmarks, Content, Highlights, Notes};
pub use crate::db::{Database, HIGHLIGHTS_RESET_VERSION, SCHEMA_VERSION};
