//! What the reader application calls into.
//!
//! A [`Library`] ties together the four data sources of the reader:
//!
//! - the user's document folder (`SastraApp/`), holding downloaded books and
//!   their manifest,
//! - the bundled resources (`resources/`), holding books shipped with the
//!   application,
//! - the hosted backend, serving the online catalog, online books and the
//!   user's synced annotations,
//! - the local store, caching annotations on the device.
//!
//! Book listing and content resolution live in [`books`] and [`resolve`];
//! highlight, note and bookmark handling in [`sync`]; signing in and keeping
//! the session across restarts in [`auth`]. Application state is an
//! explicit [`Settings`](sastra_config::Settings) value that the shell owns and
//! lends to the operations that update it.

pub mod auth;
pub mod books;
mod degrade;
pub mod error;
pub mod resolve;
pub mod sync;

pub use crate::degrade::{Degrade, Empty};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sastra_archive::{ArchiveReader, FileRoot};
use sastra_config::{Config, SessionFile, Settings, SettingsFile};
use sastra_remote::RemoteClient;
use sastra_remote::backend::SupabaseBackend;
use sastra_store::Database;
use std::sync::Arc;

const DEFAULT_PERMITTED_ROLE: &str = "permitted";

/// Handle to every data source the reader uses.
pub struct Library {
    remote: RemoteClient,
    documents: FileRoot,
    resources: FileRoot,
    reader: ArchiveReader,
    store: Database,
    settings_file: Option<SettingsFile>,
    session_file: Option<SessionFile>,
    permitted_role: String,
}

/// Run settings or session file I/O on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> sastra_config::error::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .or_raise(|| ErrorKind::Settings)?
        .or_raise(|| ErrorKind::Settings)
}

impl Library {
    pub fn new(remote: RemoteClient, documents: FileRoot, resources: FileRoot, store: Database) -> Self {
        Self {
            remote,
            documents,
            resources,
            reader: ArchiveReader::default(),
            store,
            settings_file: None,
            session_file: None,
            permitted_role: DEFAULT_PERMITTED_ROLE.to_string(),
        }
    }

    /// Wire everything up from configuration: the hosted backend, both file
    /// roots, the local store (upgraded to the current schema), the settings
    /// file and the session saved by the last run.
    pub async fn open(config: &Config) -> Result<Self> {
        let backend = SupabaseBackend::new(&config.remote.url, config.remote.anon_key.as_str())
            .or_raise(|| ErrorKind::Remote)?;
        let remote = RemoteClient::new(Arc::new(backend))
            .with_timeout(config.timeout())
            .with_toc_bucket(config.remote.toc_bucket.as_str());
        let documents = FileRoot::new("documents", &config.paths.documents).or_raise(|| ErrorKind::Archive)?;
        let resources = FileRoot::new("resources", &config.paths.resources).or_raise(|| ErrorKind::Archive)?;
        let store = Database::connect(&config.paths.database).await.or_raise(|| ErrorKind::Store)?;
        tracing::info!(
            documents = %documents.root().display(),
            resources = %resources.root().display(),
            "Opened library"
        );
        let library = Self::new(remote, documents, resources, store)
            .with_reader(ArchiveReader::new(config.timeout()))
            .with_settings_file(SettingsFile::new(&config.paths.settings))
            .with_session_file(SessionFile::new(&config.paths.session))
            .with_permitted_role(config.permitted_role.as_str());
        library.restore_session().await;
        Ok(library)
    }

    pub fn with_reader(mut self, reader: ArchiveReader) -> Self {
        self.reader = reader;
        self
    }

    /// Persist settings here whenever an operation changes them.
    pub fn with_settings_file(mut self, file: SettingsFile) -> Self {
        self.settings_file = Some(file);
        self
    }

    /// Keep the signed-in session here between runs.
    pub fn with_session_file(mut self, file: SessionFile) -> Self {
        self.session_file = Some(file);
        self
    }

    /// Role a signed-in user needs for online and bundled books.
    pub fn with_permitted_role(mut self, role: impl Into<String>) -> Self {
        self.permitted_role = role.into();
        self
    }

    pub fn remote(&self) -> &RemoteClient {
        &self.remote
    }

    pub fn store(&self) -> &Database {
        &self.store
    }

    /// Load settings from the configured file, or the defaults without one.
    pub fn load_settings(&self) -> Result<Settings> {
        match &self.settings_file {
            Some(file) => file.load().or_raise(|| ErrorKind::Settings),
            None => Ok(Settings::default()),
        }
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let Some(file) = self.settings_file.clone() else {
            return Ok(());
        };
        let settings = settings.clone();
        blocking(move || file.save(&settings)).await
    }

    async fn is_permitted(&self) -> bool {
        self.remote.get_auth_info().await.is_permitted(&self.permitted_role)
    }

    /// Save the session, which may have been refreshed since sign-in, and
    /// release the local store.
    pub async fn close(self) {
        if let Err(err) = self.save_session().await {
            tracing::warn!(error = ?err, "Failed to save session");
        }
        self.store.close().await;
    }
}
