//! Reading books and tables of contents from disk.
//!
//! Books arrive in one of a handful of shapes, told apart by file extension
//! ([`ArchiveFormat::from_path`]):
//!
//! - **Plain JSON**: parsed directly.
//! - **Zipped JSON**: a zip archive; the first `.json` entry is parsed.
//! - **Compressed JSON**: a single gzip or bzip2 stream around a JSON file.
//! - **Embedded SQLite**: a database file with one table per book code,
//!   queried with [`ArchiveReader::read_table`].
//!
//! All paths are relative to a [`FileRoot`] (the user's document folder or
//! the bundled resources) and are validated so they can't escape it. Every
//! read is bounded by the [`ArchiveReader`]'s timeout.

mod decode;
pub mod error;
mod format;
mod read;
mod root;
mod sqlite;

pub use crate::decode::{decode_document, decode_zip, into_rows};
pub use crate::read::ArchiveReader;
pub use crate::root::{FileRoot, validate as validate_path};

/// A supported on-disk book format.
///
/// Defaults to [`Unsupported`](Self::Unsupported), which readers treat as
/// "nothing to read".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Plain JSON (.json)
    Json,
    /// Zip archive holding a JSON file (.zip)
    Zip,
    /// Gzip-compressed JSON (.gz)
    Gzip,
    /// Bzip2-compressed JSON (.bz2)
    Bzip2,
    /// Embedded SQLite database (.db, .sqlite, .sqlite3)
    Sqlite,
    /// Anything else
    #[default]
    Unsupported,
}
