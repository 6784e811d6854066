use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Name of the zipped table-of-contents archive the remote storage bucket
/// serves for a book code.
#[must_use]
pub fn toc_archive_name(code: &str) -> String {
    format!("toc_{code}.json.zip")
}

/// Where a book's data lives.
///
/// Each variant maps to exactly one resolution path; only the variants backed
/// by a file on disk carry file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum BookSource {
    /// Downloaded by the user into the document root.
    Local { file: String, toc: String },
    /// Served by the remote backend, one table per book code.
    Online,
    /// Bundled with the application resources.
    Installed { file: String, toc: String },
}

impl BookSource {
    /// The suffix tag shown next to the book name.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            BookSource::Local { .. } => "(L)",
            BookSource::Online => "(O)",
            BookSource::Installed { .. } => "(I)",
        }
    }
}

/// A book available to the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookEntry {
    pub short_name: String,
    #[serde(default)]
    pub full_name: String,
    /// Remote table name, and table name inside embedded SQLite books.
    pub code: String,
    #[serde(flatten)]
    pub source: BookSource,
}

impl BookEntry {
    /// Short name with the source tag appended, e.g. `Gita (L)`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.short_name, self.source.tag())
    }

    /// File holding the book's content rows, if it has one on disk.
    #[must_use]
    pub fn content_file(&self) -> Option<&str> {
        match &self.source {
            BookSource::Local { file, .. } | BookSource::Installed { file, .. } => Some(file),
            BookSource::Online => None,
        }
    }

    /// File holding the book's table of contents.
    ///
    /// Online books don't declare one; the name is derived from the code.
    #[must_use]
    pub fn toc_file(&self) -> Cow<'_, str> {
        match &self.source {
            BookSource::Local { toc, .. } | BookSource::Installed { toc, .. } => Cow::Borrowed(toc),
            BookSource::Online => Cow::Owned(toc_archive_name(&self.code)),
        }
    }
}

/// One entry of a `bookslist.json` manifest (user documents or bundled
/// resources).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub short_name: String,
    #[serde(default)]
    pub full_name: String,
    pub code: String,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub toc: String,
}

impl ManifestEntry {
    #[must_use]
    pub fn into_local(self) -> BookEntry {
        BookEntry {
            short_name: self.short_name,
            full_name: self.full_name,
            code: self.code,
            source: BookSource::Local { file: self.file, toc: self.toc },
        }
    }

    #[must_use]
    pub fn into_installed(self) -> BookEntry {
        BookEntry {
            short_name: self.short_name,
            full_name: self.full_name,
            code: self.code,
            source: BookSource::Installed { file: self.file, toc: self.toc },
        }
    }
}

/// A row of the remote `books` catalog table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogBook {
    pub short_name: String,
    #[serde(default)]
    pub full_name: String,
    pub code: String,
}

impl From<CatalogBook> for BookEntry {
    fn from(book: CatalogBook) -> Self {
        BookEntry {
            short_name: book.short_name,
            full_name: book.full_name,
            code: book.code,
            source: BookSource::Online,
        }
    }
}
