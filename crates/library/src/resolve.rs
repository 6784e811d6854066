//! Reading book content and tables of contents from wherever a book lives.
//!
//! | Book | Read from |
//! |---|---|
//! | online, permitted session | the remote backend, never the disk |
//! | online, otherwise | nothing (empty) |
//! | installed | `resources/db/<file>` under the resource root |
//! | local | `SastraApp/db/<file>` under the document root |
//!
//! Files are then read by extension: zipped or compressed JSON and plain JSON
//! as documents, `.db` files as embedded SQLite (table named after the book
//! code), anything else as empty.

use crate::error::{ErrorKind, Result};
use crate::{Degrade, Empty, Library};
use exn::OptionExt;
use sastra_archive::error::Error as ArchiveError;
use sastra_archive::{ArchiveFormat, FileRoot, into_rows};
use sastra_config::Settings;
use sastra_models::{BookEntry, BookSource, Row, VerseQuery};
use serde_json::Value;
use tracing::instrument;

/// Folder of downloaded books, under the document root.
pub const LOCAL_BOOKS: &str = "SastraApp/db";
/// Folder of bundled books, under the resource root.
pub const BUNDLED_BOOKS: &str = "resources/db";

enum Location<'a> {
    Remote,
    File { root: &'a FileRoot, path: String },
    Unavailable,
}

fn archive_error(err: ArchiveError) -> crate::error::Error {
    let kind = if err.is_not_found() { ErrorKind::NotFound } else { ErrorKind::Archive };
    err.raise(kind)
}

impl Library {
    fn locate(&self, book: &BookEntry, file: &str, permitted: bool) -> Location<'_> {
        match &book.source {
            BookSource::Online if permitted => Location::Remote,
            BookSource::Online => Location::Unavailable,
            BookSource::Installed { .. } => {
                Location::File { root: &self.resources, path: format!("{BUNDLED_BOOKS}/{file}") }
            },
            BookSource::Local { .. } => Location::File { root: &self.documents, path: format!("{LOCAL_BOOKS}/{file}") },
        }
    }

    /// Rows of a book file, with `filter` pushed down where the format
    /// supports it.
    async fn read_rows(&self, root: &FileRoot, path: &str, table: &str, filter: Option<&VerseQuery>) -> Result<Vec<Row>> {
        match ArchiveFormat::from_path(path) {
            ArchiveFormat::Sqlite => self.reader.read_table(root, path, table, filter).await.map_err(archive_error),
            format if format.is_document() => {
                let document = self.reader.read_document(root, path).await.map_err(archive_error)?;
                into_rows(document).map_err(archive_error)
            },
            format => {
                tracing::debug!(%format, path, "Unreadable book file; treating as empty");
                Ok(Vec::new())
            },
        }
    }

    /// Content rows of the open book selected by `query`.
    ///
    /// # Errors
    ///
    /// [`NoBookSelected`](ErrorKind::NoBookSelected) without an open book;
    /// [`NotFound`](ErrorKind::NotFound) when the book file, or the JSON
    /// entry inside its archive, is missing.
    pub async fn fetch_content(&self, settings: &Settings, query: &VerseQuery) -> Result<Vec<Row>> {
        let book = settings.book.as_ref().ok_or_raise(|| ErrorKind::NoBookSelected)?;
        self.fetch_book_content(book, query).await
    }

    /// Content rows of `book` selected by `query`.
    #[instrument(skip_all, fields(book = %book.display_name(), url = %query.url, collection = query.collection))]
    pub async fn fetch_book_content(&self, book: &BookEntry, query: &VerseQuery) -> Result<Vec<Row>> {
        let permitted = self.is_permitted().await;
        match self.locate(book, book.content_file().unwrap_or_default(), permitted) {
            Location::Remote => Ok(self.remote.fetch_content_rows(&book.code, query).await),
            Location::Unavailable => {
                tracing::info!("Online book needs a permitted session");
                Ok(Vec::new())
            },
            Location::File { root, path } => {
                let rows = self.read_rows(root, &path, &book.code, Some(query)).await?;
                Ok(query.filter(rows))
            },
        }
    }

    /// Table of contents of `book`. Online books read `toc_<code>.json.zip`
    /// from the backend; embedded SQLite books contribute their whole table.
    #[instrument(skip_all, fields(book = %book.display_name()))]
    pub async fn load_book_toc(&self, book: &BookEntry, permitted: bool) -> Result<Value> {
        let toc_file = book.toc_file();
        match self.locate(book, &toc_file, permitted) {
            Location::Remote => Ok(self.remote.fetch_toc(&book.code).await),
            Location::Unavailable => Ok(Value::empty()),
            Location::File { root, path } => match ArchiveFormat::from_path(&path) {
                format if format.is_document() => self.reader.read_document(root, &path).await.map_err(archive_error),
                _ => {
                    let rows = self.read_rows(root, &path, &book.code, None).await?;
                    Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
                },
            },
        }
    }

    /// Refresh the book list, then load one table of contents per available
    /// book into `settings.toc`, in the same order. A book whose toc can't be
    /// read gets an empty slot (logged), and so does a failure to save the
    /// refreshed list.
    pub async fn load_toc<'s>(&self, settings: &'s mut Settings) -> Result<&'s [Value]> {
        match self.list_books(settings).await {
            Err(err) if matches!(&*err, ErrorKind::Settings) => {
                tracing::warn!(error = ?err, "Failed to save settings; loading tables of contents anyway");
            },
            listed => {
                listed?;
            },
        }
        let permitted = self.is_permitted().await;
        let mut toc = Vec::with_capacity(settings.books_available.len());
        for book in &settings.books_available {
            toc.push(self.load_book_toc(book, permitted).await.or_empty("table of contents"));
        }
        settings.toc = toc;
        Ok(&settings.toc)
    }
}
