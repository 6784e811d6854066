//! Domain types shared by every crate of the Sastra data-access layer.
//!
//! Nothing in here performs I/O. Types are plain `serde` models so that the
//! local store, the archive reader and the remote client all speak the same
//! shapes:
//!
//! - [`BookEntry`] / [`BookSource`]: where a book lives and how to read it.
//! - [`Row`] / [`VerseQuery`]: content rows and the `verse_url` filter applied
//!   to them.
//! - [`Highlight`], [`Note`], [`Bookmark`]: user annotations.

mod annotation;
mod book;
mod verse;

pub use crate::annotation::{Bookmark, Highlight, Note, REMOTE_BOOKKEEPING};
pub use crate::book::{BookEntry, BookSource, CatalogBook, ManifestEntry, toc_archive_name};
pub use crate::verse::{Row, VerseQuery};
