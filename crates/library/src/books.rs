//! Assembling the list of available books and picking one.

use crate::error::{ErrorKind, Result};
use crate::{Degrade, Library};
use exn::{OptionExt, ResultExt};
use sastra_archive::FileRoot;
use sastra_config::Settings;
use sastra_models::{BookEntry, ManifestEntry};
use tracing::instrument;

/// Manifest of downloaded books, under the document root.
pub const LOCAL_MANIFEST: &str = "SastraApp/bookslist.json";
/// Manifest of bundled books, under the resource root.
pub const BUNDLED_MANIFEST: &str = "resources/bookslist.json";

/// A missing manifest lists no books.
async fn read_manifest(root: &FileRoot, path: &str) -> Result<Vec<ManifestEntry>> {
    let data = match root.read(path).await {
        Ok(data) => data,
        Err(err) if err.is_not_found() => {
            tracing::debug!(root = root.name(), path, "No manifest");
            return Ok(Vec::new());
        },
        Err(err) => return Err(err.raise(ErrorKind::Archive)),
    };
    serde_json::from_slice(&data).or_raise(|| ErrorKind::Archive)
}

impl Library {
    /// Rebuild `settings.books_available` and persist the settings.
    ///
    /// Downloaded books are always listed. With a permitted session the
    /// online catalog follows, then the bundled books. Nothing is
    /// de-duplicated: a book present in several places appears once per
    /// place, each entry reading from its own source. An unreadable
    /// manifest lists nothing (logged).
    #[instrument(skip_all)]
    pub async fn list_books<'s>(&self, settings: &'s mut Settings) -> Result<&'s [BookEntry]> {
        let mut books: Vec<BookEntry> = read_manifest(&self.documents, LOCAL_MANIFEST)
            .await
            .or_empty("local manifest")
            .into_iter()
            .map(ManifestEntry::into_local)
            .collect();
        if self.is_permitted().await {
            books.extend(self.remote.fetch_books().await.into_iter().map(BookEntry::from));
            let bundled = read_manifest(&self.resources, BUNDLED_MANIFEST).await.or_empty("bundled manifest");
            books.extend(bundled.into_iter().map(ManifestEntry::into_installed));
        }
        tracing::info!(books = books.len(), "Listed available books");
        settings.books_available = books;
        self.save_settings(settings).await?;
        Ok(&settings.books_available)
    }

    /// Open the book at `index` of `settings.books_available` and persist the
    /// choice.
    pub async fn select_book(&self, settings: &mut Settings, index: usize) -> Result<BookEntry> {
        let book = settings.books_available.get(index).cloned().ok_or_raise(|| ErrorKind::NoSuchBook(index))?;
        tracing::debug!(book = %book.display_name(), "Selected book");
        settings.code = Some(book.code.clone());
        settings.book = Some(book.clone());
        self.save_settings(settings).await?;
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{fixture, permitted};
    use sastra_config::SettingsFile;
    use sastra_models::BookSource;
    use sastra_remote::backend::MockBackend;
    use serde_json::json;

    const GITA_MANIFEST: &str = r#"[{ "code": "gita", "short_name": "Gita", "file": "gita.zip", "toc": "toc_gita.zip" }]"#;

    fn catalog() -> MockBackend {
        permitted().with_rows("books", [json!({ "short_name": "SB", "full_name": "Srimad Bhagavatam", "code": "sb" })])
    }

    #[tokio::test]
    async fn test_local_manifest_without_session() {
        let backend = MockBackend::default().with_rows("books", [json!({ "short_name": "SB", "code": "sb" })]);
        let fixture = fixture(backend).await;
        fixture.write_document(LOCAL_MANIFEST, GITA_MANIFEST.as_bytes()).await;
        fixture.write_resource(BUNDLED_MANIFEST, br#"[{ "code": "cc", "short_name": "CC" }]"#).await;

        let mut settings = Settings::default();
        let books = fixture.library.list_books(&mut settings).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].display_name(), "Gita (L)");
        assert!(!fixture.backend.calls().iter().any(|call| call.starts_with("select")));
    }

    #[tokio::test]
    async fn test_order_is_local_online_installed() {
        let fixture = fixture(catalog()).await;
        fixture.write_document(LOCAL_MANIFEST, GITA_MANIFEST.as_bytes()).await;
        fixture.write_resource(BUNDLED_MANIFEST, GITA_MANIFEST.as_bytes()).await;

        let mut settings = Settings::default();
        let books = fixture.library.list_books(&mut settings).await.unwrap();
        let names: Vec<String> = books.iter().map(BookEntry::display_name).collect();
        assert_eq!(names, vec!["Gita (L)", "SB (O)", "Gita (I)"]);
        assert_eq!(books[1].source, BookSource::Online);
        assert_eq!(books[1].toc_file(), "toc_sb.json.zip");
    }

    #[tokio::test]
    async fn test_missing_manifests_list_only_online_books() {
        let fixture = fixture(catalog()).await;
        let mut settings = Settings::default();
        let books = fixture.library.list_books(&mut settings).await.unwrap();
        assert_eq!(books.iter().map(|b| b.code.as_str()).collect::<Vec<_>>(), vec!["sb"]);
    }

    #[tokio::test]
    async fn test_malformed_manifest_lists_nothing() {
        let fixture = fixture(MockBackend::default()).await;
        fixture.write_document(LOCAL_MANIFEST, b"{ not json").await;
        let mut settings = Settings::default();
        assert!(fixture.library.list_books(&mut settings).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_books_persists_settings() {
        let fixture = fixture(MockBackend::default()).await;
        fixture.write_document(LOCAL_MANIFEST, GITA_MANIFEST.as_bytes()).await;
        let mut settings = Settings::default();
        fixture.library.list_books(&mut settings).await.unwrap();

        let saved = SettingsFile::new(fixture.settings_path()).load().unwrap();
        assert_eq!(saved.books_available, settings.books_available);
    }

    #[tokio::test]
    async fn test_select_book() {
        let fixture = fixture(MockBackend::default()).await;
        fixture.write_document(LOCAL_MANIFEST, GITA_MANIFEST.as_bytes()).await;
        let mut settings = Settings::default();
        fixture.library.list_books(&mut settings).await.unwrap();

        let book = fixture.library.select_book(&mut settings, 0).await.unwrap();
        assert_eq!(book.code, "gita");
        assert_eq!(settings.code.as_deref(), Some("gita"));

        let err = fixture.library.select_book(&mut settings, 3).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoSuchBook(3)));
    }

    #[tokio::test]
    async fn test_unwritable_settings_fail_listing() {
        let fixture = fixture(MockBackend::default()).await;
        fixture.write_document(LOCAL_MANIFEST, GITA_MANIFEST.as_bytes()).await;
        std::fs::create_dir_all(fixture.settings_path()).unwrap();

        let mut settings = Settings::default();
        let err = fixture.library.list_books(&mut settings).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Settings));
        assert_eq!(settings.books_available.len(), 1);
    }
}
