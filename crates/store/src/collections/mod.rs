//! One repository per collection.
//!
//! Each repository is a cheap handle around the shared pool, built from a
//! [`Database`](crate::Database) via `From<&Database>` or the accessors on
//! `Database` itself.

mod bookmarks;
mod content;
mod highlights;
mod notes;

pub use self::bookmarks::Bookmarks;
pub use self::content::Content;
pub use self::highlights::Highlights;
pub use self::notes::Notes;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

fn to_json<T: Serialize>(value: &T, what: &'static str) -> Result<String> {
    serde_json::to_string(value).or_raise(|| ErrorKind::InvalidData(what))
}

fn from_json<T: DeserializeOwned>(data: &str, what: &'static str) -> Result<T> {
    serde_json::from_str(data).or_raise(|| ErrorKind::InvalidData(what))
}
