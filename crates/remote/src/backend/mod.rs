//! Remote backend trait and implementations.
//!
//! A [`RemoteBackend`] is the raw transport: every method returns a typed
//! error and applies no policy. Logging, timeouts and the decision whether a
//! failure degrades to an empty result live in
//! [`RemoteClient`](crate::RemoteClient).

mod filter;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod supabase;

pub use self::filter::Filter;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
pub use self::supabase::SupabaseBackend;
use crate::error::Result;
use crate::models::Session;
use async_trait::async_trait;
use sastra_models::Row;

/// Unified interface for hosted backends: an auth service, a table API and
/// object storage.
///
/// Table names are passed through verbatim; callers are responsible for only
/// naming tables they expect to exist (book codes come from the catalog).
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Name of the backend, for logging only.
    fn name(&self) -> &str;

    /// Sign in with email and password, replacing any current session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Register a new account.
    ///
    /// Returns `None` when the account was created but needs confirming
    /// before it can sign in.
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<Option<Session>>;

    /// URL the user opens to sign in with a third-party identity provider.
    fn authorize_url(&self, provider: &str) -> Result<String>;

    /// Adopt the session a provider sign-in redirected back with, looking up
    /// the user the access token belongs to.
    async fn set_session(&self, access_token: &str, refresh_token: Option<&str>) -> Result<Session>;

    /// Adopt a previously saved session as is, without contacting the
    /// backend. An expired access token is renewed on first use.
    async fn restore_session(&self, session: Session) -> Result<()>;

    /// Trade the current session's refresh token for a new access token.
    ///
    /// Returns [`Auth`](crate::error::ErrorKind::Auth) without a session or
    /// without a refresh token.
    async fn refresh_session(&self) -> Result<Session>;

    /// End the current session. Signing out without a session is not an error.
    async fn sign_out(&self) -> Result<()>;

    /// The current session, if any.
    async fn session(&self) -> Result<Option<Session>>;

    /// All rows of `table` matching every filter.
    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>>;

    async fn insert(&self, table: &str, row: &Row) -> Result<()>;

    /// Insert, or merge into the row whose `on_conflict` column matches.
    async fn upsert(&self, table: &str, row: &Row, on_conflict: &str) -> Result<()>;

    /// Delete every row matching all filters. At least one filter is
    /// required; an unfiltered delete is rejected.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()>;

    /// Download an object from a storage bucket.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>>;
}
