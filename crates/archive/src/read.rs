use crate::error::{ErrorKind, Result};
use crate::{ArchiveFormat, FileRoot, decode, sqlite};
use exn::ResultExt;
use sastra_models::{Row, VerseQuery};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads book files below a [`FileRoot`], bounding every read by a timeout.
///
/// # Examples
///
/// ```no_run
/// use sastra_archive::{ArchiveReader, FileRoot};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let documents = FileRoot::new("documents", "/home/reader/Documents")?;
/// let reader = ArchiveReader::new(Duration::from_secs(10));
/// let toc = reader.read_document(&documents, "SastraApp/db/toc_gita.json.zip").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ArchiveReader {
    timeout: Duration,
}

impl Default for ArchiveReader {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ArchiveReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn bounded<T>(&self, read: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, read).await {
            Ok(result) => result,
            Err(_) => exn::bail!(ErrorKind::Timeout),
        }
    }

    /// Read and decode a document-shaped file (JSON, zipped or compressed
    /// JSON), with the format taken from the file extension.
    ///
    /// Returns [`UnsupportedFormat`](ErrorKind::UnsupportedFormat) for
    /// embedded databases and unknown extensions.
    #[instrument(skip_all, fields(root = root.name(), path = %path.as_ref().display()))]
    pub async fn read_document(&self, root: &FileRoot, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let format = ArchiveFormat::from_path(path);
        if !format.is_document() {
            exn::bail!(ErrorKind::UnsupportedFormat(format.to_string()));
        }
        self.bounded(async {
            let data = root.read(path).await?;
            tokio::task::spawn_blocking(move || decode::decode_document(&data, format))
                .await
                .or_raise(|| ErrorKind::InvalidData)?
        })
        .await
    }

    /// Read rows from a table of an embedded SQLite book.
    ///
    /// With a `filter`, the `verse_url` condition is pushed down into the
    /// query.
    #[instrument(skip_all, fields(root = root.name(), path = %path.as_ref().display(), table = table))]
    pub async fn read_table(
        &self,
        root: &FileRoot,
        path: impl AsRef<Path>,
        table: &str,
        filter: Option<&VerseQuery>,
    ) -> Result<Vec<Row>> {
        let path = path.as_ref();
        let format = ArchiveFormat::from_path(path);
        if format != ArchiveFormat::Sqlite {
            exn::bail!(ErrorKind::UnsupportedFormat(format.to_string()));
        }
        let absolute = root.absolute_path(path)?;
        self.bounded(sqlite::read_table(&absolute, table, filter)).await
    }
}
