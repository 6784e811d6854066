use crate::backend::{Filter, RemoteBackend};
use crate::error::{ErrorKind, Result};
use crate::models::{AuthInfo, Session};
use exn::ResultExt;
use sastra_models::{CatalogBook, Highlight, Note, Row, VerseQuery, toc_archive_name};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TOC_BUCKET: &str = "toc";
const BOOKS: &str = "books";
const HIGHLIGHTS: &str = "highlights";
const NOTES: &str = "notes";

/// Shared handle to a backend.
pub type BackendHandle = Arc<dyn RemoteBackend>;

/// The remote operations the application uses, with their failure policy.
///
/// Every call is bounded by a timeout. Reads and background pushes log
/// failures and return an empty value; sign-in and sign-up normalize failures
/// into [`Auth`](ErrorKind::Auth); user-initiated deletes propagate.
#[derive(Clone)]
pub struct RemoteClient {
    backend: BackendHandle,
    timeout: Duration,
    toc_bucket: String,
}

impl RemoteClient {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend, timeout: DEFAULT_TIMEOUT, toc_bucket: DEFAULT_TOC_BUCKET.to_string() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Storage bucket holding `toc_<code>.json.zip` archives.
    pub fn with_toc_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.toc_bucket = bucket.into();
        self
    }

    pub fn backend(&self) -> &dyn RemoteBackend {
        self.backend.as_ref()
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => exn::bail!(ErrorKind::Timeout),
        }
    }

    /// [`bounded`](Self::bounded) for calls that send the access token. A
    /// rejected token is refreshed once and the call repeated.
    async fn authorized<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.bounded(call()).await {
            Err(err) if err.is_unauthorized() => {
                tracing::debug!("Access token rejected; refreshing session");
                if let Err(refresh) = self.bounded(self.backend.refresh_session()).await {
                    tracing::warn!(error = %refresh.message(), "Session refresh failed");
                    return Err(err);
                }
                self.bounded(call()).await
            },
            result => result,
        }
    }

    // Auth

    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthInfo> {
        match self.bounded(self.backend.sign_in(email, password)).await {
            Ok(session) => Ok(AuthInfo::from_session(Some(&session))),
            Err(err) => {
                let message = err.message();
                tracing::warn!(%message, "Sign-in failed");
                Err(err.raise(ErrorKind::Auth(message)))
            },
        }
    }

    /// Register an account. The returned info is signed out when the backend
    /// wants the address confirmed first.
    #[instrument(skip_all)]
    pub async fn signup(&self, email: &str, password: &str, display_name: &str) -> Result<AuthInfo> {
        match self.bounded(self.backend.sign_up(email, password, display_name)).await {
            Ok(session) => Ok(AuthInfo::from_session(session.as_ref())),
            Err(err) => {
                let message = err.message();
                tracing::warn!(%message, "Sign-up failed");
                Err(err.raise(ErrorKind::Auth(message)))
            },
        }
    }

    /// URL to open for signing in with a third-party provider such as
    /// `google`. The provider redirects back with tokens, which go to
    /// [`complete_provider_login`](Self::complete_provider_login).
    pub fn login_with_provider(&self, provider: &str) -> Result<String> {
        self.backend.authorize_url(provider).map_err(|err| {
            let message = err.message();
            tracing::warn!(provider, %message, "Provider sign-in failed");
            err.raise(ErrorKind::Auth(message))
        })
    }

    /// Sign in with the tokens a provider redirect carried.
    #[instrument(skip_all)]
    pub async fn complete_provider_login(&self, access_token: &str, refresh_token: Option<&str>) -> Result<AuthInfo> {
        match self.bounded(self.backend.set_session(access_token, refresh_token)).await {
            Ok(session) => Ok(AuthInfo::from_session(Some(&session))),
            Err(err) => {
                let message = err.message();
                tracing::warn!(%message, "Provider sign-in failed");
                Err(err.raise(ErrorKind::Auth(message)))
            },
        }
    }

    /// The current session, for saving across restarts. `None` when signed
    /// out or when the session can't be read (logged).
    pub async fn current_session(&self) -> Option<Session> {
        self.bounded(self.backend.session()).await.unwrap_or_else(|err| {
            tracing::error!(error = %err.message(), "Failed to read session");
            None
        })
    }

    /// Adopt a session saved by an earlier run.
    pub async fn restore_session(&self, session: Session) -> Result<()> {
        self.bounded(self.backend.restore_session(session)).await
    }

    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<()> {
        self.bounded(self.backend.sign_out()).await.map_err(|err| {
            let message = err.message();
            tracing::warn!(%message, "Sign-out failed");
            err.raise(ErrorKind::Auth(message))
        })
    }

    /// Current user and role. Never fails: without a readable session this is
    /// the signed-out value.
    pub async fn get_auth_info(&self) -> AuthInfo {
        match self.bounded(self.backend.session()).await {
            Ok(session) => AuthInfo::from_session(session.as_ref()),
            Err(err) => {
                tracing::error!(error = %err.message(), "Failed to read session");
                AuthInfo::default()
            },
        }
    }

    // Catalog and content

    /// Books listed in the remote catalog. Empty on failure.
    #[instrument(skip_all)]
    pub async fn fetch_books(&self) -> Vec<CatalogBook> {
        let rows = match self.authorized(|| self.backend.select(BOOKS, &[])).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(error = %err.message(), "Failed to fetch books list");
                return Vec::new();
            },
        };
        rows.into_iter()
            .filter_map(|row| match serde_json::from_value(Value::Object(row)) {
                Ok(book) => Some(book),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping malformed catalog row");
                    None
                },
            })
            .collect()
    }

    /// Table of contents for every catalog book, in catalog order.
    ///
    /// A book whose archive can't be fetched or decoded gets an empty toc
    /// (`[]`); a failed catalog query gives an empty list.
    #[instrument(skip_all)]
    pub async fn fetch_catalog(&self) -> Vec<(String, Value)> {
        let mut catalog = Vec::new();
        for book in self.fetch_books().await {
            let toc = self.fetch_toc(&book.code).await;
            catalog.push((book.code, toc));
        }
        catalog
    }

    /// Decoded `toc_<code>.json.zip` from the toc bucket. `[]` on failure.
    #[instrument(skip(self))]
    pub async fn fetch_toc(&self, code: &str) -> Value {
        match self.try_fetch_toc(code).await {
            Ok(toc) => toc,
            Err(err) => {
                tracing::error!(error = %err.message(), "Failed to read toc archive");
                json!([])
            },
        }
    }

    async fn try_fetch_toc(&self, code: &str) -> Result<Value> {
        let archive = toc_archive_name(code);
        let data = self.authorized(|| self.backend.download(&self.toc_bucket, &archive)).await?;
        let entry = archive.trim_end_matches(".zip").to_string();
        tokio::task::spawn_blocking(move || sastra_archive::decode_zip(&data, Some(&entry)))
            .await
            .or_raise(|| ErrorKind::InvalidData)?
            .or_raise(|| ErrorKind::InvalidData)
    }

    /// Rows of the `code` table selected by `query`. Empty on failure.
    ///
    /// The prefix match is pushed down as a `LIKE`, whose `_` and `%` are
    /// wildcards, so results are filtered again here: only exact matches or
    /// strict `url/` prefixes come back.
    #[instrument(skip(self))]
    pub async fn fetch_content_rows(&self, code: &str, query: &VerseQuery) -> Vec<Row> {
        let filters = [Filter::Verse(query.clone())];
        match self.authorized(|| self.backend.select(code, &filters)).await {
            Ok(rows) => query.filter(rows),
            Err(err) => {
                tracing::error!(error = %err.message(), "Failed to fetch book content");
                Vec::new()
            },
        }
    }

    // Highlights

    /// Push a highlight without its local id; the backend assigns its own.
    /// Failures are logged only.
    #[instrument(skip_all, fields(toc_url = %highlight.toc_url))]
    pub async fn sync_highlight(&self, highlight: &Highlight) {
        let row = match serde_json::to_value(highlight.without_id()) {
            Ok(Value::Object(row)) => row,
            _ => {
                tracing::error!("Highlight does not serialize to an object");
                return;
            },
        };
        if let Err(err) = self.authorized(|| self.backend.insert(HIGHLIGHTS, &row)).await {
            tracing::error!(error = %err.message(), "Highlight sync error");
        }
    }

    /// Remote highlights for a toc entry, carrying their remote ids. Empty on
    /// failure.
    #[instrument(skip(self))]
    pub async fn fetch_highlights(&self, toc_url: &str) -> Vec<Highlight> {
        match self.try_fetch_highlights(toc_url).await {
            Ok(highlights) => highlights,
            Err(err) => {
                tracing::error!(error = %err.message(), "Error fetching highlights");
                Vec::new()
            },
        }
    }

    /// Remote highlights for a toc entry, for callers that must not mistake a
    /// failed lookup for "none".
    pub async fn try_fetch_highlights(&self, toc_url: &str) -> Result<Vec<Highlight>> {
        let filters = [Filter::eq("toc_url", toc_url)];
        let rows = self.authorized(|| self.backend.select(HIGHLIGHTS, &filters)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(Value::Object(row)) {
                Ok(highlight) => Some(highlight),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping malformed highlight row");
                    None
                },
            })
            .collect())
    }

    /// Delete a highlight by its remote id.
    ///
    /// Without an id there is nothing to address: that is logged and nothing
    /// is sent. A failed delete is logged and returned.
    #[instrument(skip_all, fields(toc_url = %highlight.toc_url, id = highlight.id))]
    pub async fn delete_highlight(&self, highlight: &Highlight) -> Result<()> {
        let Some(id) = highlight.id else {
            tracing::error!("Cannot delete highlight without an id");
            return Ok(());
        };
        let filters = [Filter::eq("id", id)];
        self.authorized(|| self.backend.delete(HIGHLIGHTS, &filters)).await.inspect_err(|err| {
            tracing::error!(error = %err.message(), "Failed to delete highlight");
        })
    }

    // Notes

    /// Upsert a note by `toc_url`. Failures are logged only.
    #[instrument(skip(self, text))]
    pub async fn sync_note(&self, toc_url: &str, text: &str) {
        let mut row = Row::new();
        row.insert("toc_url".to_string(), Value::from(toc_url));
        row.insert("text".to_string(), Value::from(text));
        if let Err(err) = self.authorized(|| self.backend.upsert(NOTES, &row, "toc_url")).await {
            tracing::error!(error = %err.message(), "Note sync error");
        }
    }

    /// The remote note for a toc entry. `None` when there is none, or when
    /// the fetch fails (logged).
    #[instrument(skip(self))]
    pub async fn fetch_note(&self, toc_url: &str) -> Option<Note> {
        let filters = [Filter::eq("toc_url", toc_url)];
        let rows = match self.authorized(|| self.backend.select(NOTES, &filters)).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(error = %err.message(), "Error fetching note");
                return None;
            },
        };
        let row = rows.into_iter().next()?;
        let text = row.get("text").and_then(Value::as_str).unwrap_or_default();
        Some(Note::new(toc_url, text))
    }

    /// Delete several notes in one request. An empty list sends nothing.
    #[instrument(skip_all, fields(notes = toc_urls.len()))]
    pub async fn bulk_delete_notes(&self, toc_urls: &[String]) -> Result<()> {
        if toc_urls.is_empty() {
            return Ok(());
        }
        let filters = [Filter::is_in("toc_url", toc_urls)];
        self.authorized(|| self.backend.delete(NOTES, &filters)).await.inspect_err(|err| {
            tracing::error!(error = %err.message(), "Failed to bulk delete notes");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use serde_json::Map;
    use std::io::{Cursor, Write};

    fn client(backend: MockBackend) -> (Arc<MockBackend>, RemoteClient) {
        let backend = Arc::new(backend);
        (backend.clone(), RemoteClient::new(backend))
    }

    fn toc_zip(entry: &str, json: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file(entry, zip::write::SimpleFileOptions::default()).unwrap();
        writer.write_all(json.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn range(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_login_failure_is_normalized() {
        let (_, client) = client(MockBackend::default().with_account("reader@example.com", "secret", None));
        let err = client.login("reader@example.com", "wrong").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Auth(message) if message == "Invalid login credentials"));
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let (_, client) =
            client(MockBackend::default().with_account("reader@example.com", "secret", Some("permitted")));
        let info = client.login("reader@example.com", "secret").await.unwrap();
        assert!(info.is_permitted("permitted"));
        assert_eq!(client.get_auth_info().await, info);
        client.logout().await.unwrap();
        assert_eq!(client.get_auth_info().await, AuthInfo::default());
    }

    #[tokio::test]
    async fn test_signup_stores_display_name() {
        let (_, client) = client(MockBackend::default());
        let info = client.signup("new@example.com", "secret", "New Reader").await.unwrap();
        assert_eq!(info.user.unwrap()["display_name"], json!("New Reader"));
        let err = client.signup("new@example.com", "secret", "Again").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Auth(_)));
    }

    #[test]
    fn test_login_with_provider() {
        let (_, client) = client(MockBackend::default());
        assert_eq!(client.login_with_provider("google").unwrap(), "mock://auth/v1/authorize?provider=google");
        let (_, client) = self::client(MockBackend::default().failing("authorize_url"));
        assert!(matches!(&*client.login_with_provider("myspace").unwrap_err(), ErrorKind::Auth(_)));
    }

    #[tokio::test]
    async fn test_complete_provider_login() {
        let (_, client) = client(MockBackend::default().with_account("reader@example.com", "", Some("permitted")));
        assert!(!client.get_auth_info().await.is_signed_in());

        let info = client.complete_provider_login("token-user-reader@example.com", Some("refresh")).await.unwrap();
        assert!(info.is_permitted("permitted"));
        assert_eq!(client.get_auth_info().await, info);
        let session = client.current_session().await.unwrap();
        assert_eq!(session.refresh_token.as_deref(), Some("refresh"));

        let err = client.complete_provider_login("forged", None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Auth(_)));
    }

    #[tokio::test]
    async fn test_restore_session() {
        let (_, signed_in) = client(MockBackend::default().signed_in("reader@example.com", Some("permitted")));
        let session = signed_in.current_session().await.unwrap();

        let (_, client) = client(MockBackend::default());
        assert_eq!(client.current_session().await, None);
        client.restore_session(session.clone()).await.unwrap();
        assert_eq!(client.current_session().await, Some(session));
        assert!(client.get_auth_info().await.is_permitted("permitted"));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once() {
        let backend = MockBackend::default()
            .signed_in("reader@example.com", Some("permitted"))
            .with_rows("notes", [json!({ "toc_url": "bg/1", "text": "kept" })])
            .with_expired_token();
        let (backend, client) = client(backend);

        assert_eq!(client.fetch_note("bg/1").await, Some(Note::new("bg/1", "kept")));
        assert_eq!(backend.calls(), vec!["select notes", "refresh_session", "select notes"]);
        let session = client.current_session().await.unwrap();
        assert!(session.access_token.ends_with("-refreshed"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_original_error() {
        let backend = MockBackend::default()
            .signed_in("reader@example.com", None)
            .with_rows("notes", [])
            .with_expired_token()
            .failing("refresh_session");
        let (backend, client) = client(backend);
        let err = client.bulk_delete_notes(&["bg/1".to_string()]).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(backend.calls(), vec!["delete notes", "refresh_session"]);
    }

    #[tokio::test]
    async fn test_try_fetch_highlights_reports_failure() {
        let backend = MockBackend::default().with_rows("highlights", [json!({ "id": 1, "toc_url": "bg/1", "start": 0 })]);
        let (_, client) = client(backend.failing("select"));
        assert!(client.try_fetch_highlights("bg/1").await.is_err());
        assert!(client.fetch_highlights("bg/1").await.is_empty());
    }

    #[tokio::test]
    async fn test_auth_info_never_fails() {
        let (_, client) = client(MockBackend::default().signed_in("reader@example.com", None).failing("session"));
        assert_eq!(client.get_auth_info().await, AuthInfo::default());
    }

    #[tokio::test]
    async fn test_fetch_content_rows_filters_like_wildcards() {
        let rows = [
            json!({ "verse_url": "bg_1" }),
            json!({ "verse_url": "bg_1/1" }),
            json!({ "verse_url": "bg_1/2" }),
            json!({ "verse_url": "bgx1/1" }),
            json!({ "verse_url": "bg_10/1" }),
        ];
        let (_, client) = client(MockBackend::default().with_rows("gita", rows));

        let collection = client.fetch_content_rows("gita", &VerseQuery::collection("bg_1")).await;
        let urls: Vec<&str> = collection.iter().map(|row| row["verse_url"].as_str().unwrap()).collect();
        assert_eq!(urls, vec!["bg_1/1", "bg_1/2"]);

        let single = client.fetch_content_rows("gita", &VerseQuery::single("bg_1")).await;
        assert_eq!(single.len(), 1);
        assert_eq!(single[0]["verse_url"], json!("bg_1"));
    }

    #[tokio::test]
    async fn test_fetch_content_rows_is_empty_on_error() {
        let (_, client) = client(MockBackend::default());
        assert!(client.fetch_content_rows("missing", &VerseQuery::single("bg/1/1")).await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_catalog() {
        let backend = MockBackend::default()
            .with_rows(
                "books",
                [
                    json!({ "short_name": "Gita", "full_name": "Bhagavad Gita", "code": "gita" }),
                    json!({ "short_name": "SB", "full_name": "Srimad Bhagavatam", "code": "sb" }),
                ],
            )
            .with_object("toc", "toc_gita.json.zip", toc_zip("toc_gita.json", r#"[{"verse_url":"bg/1"}]"#));
        let (_, client) = client(backend);

        let books = client.fetch_books().await;
        assert_eq!(books.iter().map(|b| b.code.as_str()).collect::<Vec<_>>(), vec!["gita", "sb"]);

        let catalog = client.fetch_catalog().await;
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0], ("gita".to_string(), json!([{ "verse_url": "bg/1" }])));
        // No archive uploaded for this one.
        assert_eq!(catalog[1], ("sb".to_string(), json!([])));
    }

    #[tokio::test]
    async fn test_fetch_catalog_is_empty_when_books_fail() {
        let (_, client) = client(MockBackend::default().failing("select"));
        assert!(client.fetch_catalog().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_toc_with_custom_bucket() {
        let backend = MockBackend::default().with_object("tocs", "toc_sb.json.zip", toc_zip("toc_sb.json", "[1]"));
        let (_, client) = client(backend);
        assert_eq!(client.fetch_toc("sb").await, json!([]));
        let client = client.with_toc_bucket("tocs");
        assert_eq!(client.fetch_toc("sb").await, json!([1]));
    }

    #[tokio::test]
    async fn test_sync_highlight_strips_local_id() {
        let (backend, client) = client(MockBackend::default());
        let mut highlight = Highlight::new("bg/2/13", range(json!({ "start": 4 })));
        highlight.id = Some(99);
        client.sync_highlight(&highlight).await;

        let fetched = client.fetch_highlights("bg/2/13").await;
        assert_eq!(fetched.len(), 1);
        assert_ne!(fetched[0].id, Some(99));
        assert!(highlight.same_selection(&fetched[0]));
        assert_eq!(backend.calls(), vec!["insert highlights", "select highlights"]);
    }

    #[tokio::test]
    async fn test_delete_highlight_without_id_sends_nothing() {
        let (backend, client) = client(MockBackend::default());
        let highlight = Highlight::new("bg/2/13", Map::new());
        client.delete_highlight(&highlight).await.unwrap();
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_highlight_failure_propagates() {
        let (_, client) = client(MockBackend::default().failing("delete"));
        let mut highlight = Highlight::new("bg/2/13", Map::new());
        highlight.id = Some(1);
        assert!(client.delete_highlight(&highlight).await.is_err());
    }

    #[tokio::test]
    async fn test_notes_roundtrip() {
        let (_, client) = client(MockBackend::default());
        assert_eq!(client.fetch_note("bg/2/47").await, None);
        client.sync_note("bg/2/47", "first").await;
        client.sync_note("bg/2/47", "second").await;
        assert_eq!(client.fetch_note("bg/2/47").await, Some(Note::new("bg/2/47", "second")));

        client.bulk_delete_notes(&["bg/2/47".to_string()]).await.unwrap();
        assert_eq!(client.fetch_note("bg/2/47").await, None);
    }

    #[tokio::test]
    async fn test_bulk_delete_notes_empty_sends_nothing() {
        let (backend, client) = client(MockBackend::default().failing("delete"));
        client.bulk_delete_notes(&[]).await.unwrap();
        assert!(backend.calls().is_empty());
        assert!(client.bulk_delete_notes(&["a".to_string()]).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_time_out() {
        let backend = MockBackend::default().with_rows("gita", []).with_delay(Duration::from_secs(60));
        let (_, client) = client(backend);
        let client = client.with_timeout(Duration::from_secs(1));
        assert!(client.fetch_content_rows("gita", &VerseQuery::single("bg/1/1")).await.is_empty());
        let err = client.logout().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Auth(message) if message == "remote call timed out"));
    }
}
