//! Database connection, pool management and schema upgrades.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

use crate::collections::{Bookmarks, Content, Highlights, Notes};
use crate::error::{ErrorKind, Result};

/// Schema version this build creates and upgrades to.
pub const SCHEMA_VERSION: u32 = 3;
/// First version with working highlight clearing. Upgrading across it
/// discards every highlight stored by older builds, once.
pub const HIGHLIGHTS_RESET_VERSION: u32 = 3;
// Reads dominate; a couple of connections is plenty on a phone.
const MAX_CONNECTIONS: u32 = 3;

/// Connection pool for the local store.
///
/// Opening runs the schema upgrade when the stored version (`PRAGMA
/// user_version`) is below the requested one. The upgrade happens in a single
/// transaction which:
///
/// 1. creates any missing collection (idempotent),
/// 2. clears `highlights` if the stored version is below
///    [`HIGHLIGHTS_RESET_VERSION`] and the target is at or above it,
/// 3. records the new version.
///
/// Opening at the stored version does none of this.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: Option<u32>, version: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.upgrade(version).await?;
        Ok(db)
    }

    /// Open the store at the given path, creating it if it doesn't exist.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_at_version(path, SCHEMA_VERSION).await
    }

    /// Open the store at an explicit schema version.
    ///
    /// Only useful to exercise upgrades from older versions; applications
    /// should call [`connect`](Self::connect).
    pub async fn connect_at_version(path: impl AsRef<Path>, version: u32) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        Self::new(options, None, version).await
    }

    /// Open an in-memory store (useful for testing).
    ///
    /// Not `#[cfg(test)]` so that other crates can use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // Each connection to ":memory:" is its own database, so stay on one.
        Self::new(options, Some(1), SCHEMA_VERSION).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Apply PRAGMAs that aren't exposed via SqliteConnectOptions, on every
    /// pooled connection.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA cache_size = -2048;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Stored schema version.
    pub async fn version(&self) -> Result<i64> {
        sqlx::query_scalar("PRAGMA user_version").fetch_one(&self.pool).await.or_raise(|| ErrorKind::Database)
    }

    #[instrument("upgrading local store schema", skip(self))]
    async fn upgrade(&self, target: u32) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Upgrade)?;
        let current: i64 =
            sqlx::query_scalar("PRAGMA user_version").fetch_one(&mut *tx).await.or_raise(|| ErrorKind::Upgrade)?;
        let target_version = i64::from(target);
        if current > target_version {
            exn::bail!(ErrorKind::VersionMismatch { found: current, expected: target });
        }
        if current == target_version {
            return Ok(());
        }
        tracing::info!(from = current, to = target, "Upgrading local store schema");
        sqlx::query(include_str!("../schema/create_collections.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Upgrade)?;
        let reset = i64::from(HIGHLIGHTS_RESET_VERSION);
        if current < reset && target_version >= reset {
            // Must go through the upgrade transaction; the collections aren't
            // usable from anywhere else until it commits.
            let cleared =
                sqlx::query("DELETE FROM highlights").execute(&mut *tx).await.or_raise(|| ErrorKind::Upgrade)?;
            tracing::info!(removed = cleared.rows_affected(), "Cleared highlights written by an older schema");
        }
        // PRAGMA values can't be bound; `target` is an integer.
        sqlx::query(&format!("PRAGMA user_version = {target}"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Upgrade)?;
        tx.commit().await.or_raise(|| ErrorKind::Upgrade)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn content(&self) -> Content {
        Content::from(self)
    }

    pub fn highlights(&self) -> Highlights {
        Highlights::from(self)
    }

    pub fn notes(&self) -> Notes {
        Notes::from(self)
    }

    pub fn bookmarks(&self) -> Bookmarks {
        Bookmarks::from(self)
    }

    /// Close the connection pool.
    ///
    /// Waits for all connections to be returned to the pool. The instance
    /// must not be used afterwards.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
