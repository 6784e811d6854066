//! Supabase-compatible backend over HTTP.

use super::{Filter, RemoteBackend};
use crate::error::{ErrorKind, Result};
use crate::models::{Session, User};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use sastra_models::Row;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::instrument;

const AUTH: &str = "auth/v1/";
const REST: &str = "rest/v1/";
const STORAGE: &str = "storage/v1/object/";

/// Talks to a hosted Supabase project: GoTrue for auth, PostgREST for tables
/// and the storage API for objects.
///
/// Every request carries the project's anon key as `apikey` and, as bearer
/// token, the session's access token when signed in (the anon key otherwise).
/// The session lives in memory; saving it across restarts is up to the
/// caller (see [`RemoteBackend::restore_session`]).
///
/// # Examples
///
/// ```no_run
/// use sastra_remote::backend::{RemoteBackend, SupabaseBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = SupabaseBackend::new("https://project.supabase.co", "anon-key")?;
/// let session = backend.sign_in("reader@example.com", "secret").await?;
/// println!("signed in as {}", session.user.id);
/// # Ok(())
/// # }
/// ```
pub struct SupabaseBackend {
    name: String,
    http: Client,
    base: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
}

impl SupabaseBackend {
    pub fn new(url: &str, anon_key: impl Into<String>) -> Result<Self> {
        let anon_key = anon_key.into();
        if anon_key.is_empty() {
            exn::bail!(ErrorKind::InvalidConfig("empty anon key".to_string()));
        }
        let mut base = Url::parse(url).or_raise(|| ErrorKind::InvalidConfig(url.to_string()))?;
        if base.cannot_be_a_base() {
            exn::bail!(ErrorKind::InvalidConfig(url.to_string()));
        }
        // Url::join replaces the last path segment unless it ends in a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            name: "supabase".to_string(),
            http: Client::new(),
            base,
            anon_key,
            session: RwLock::new(None),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use a preconfigured HTTP client (proxies, custom roots).
    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path).or_raise(|| ErrorKind::InvalidConfig(path.to_string()))
    }

    fn table_url(&self, table: &str, filters: &[Filter]) -> Result<Url> {
        let mut url = self.endpoint(&format!("{REST}{table}"))?;
        {
            let mut query = url.query_pairs_mut();
            for filter in filters {
                query.append_pair(filter.column(), &filter.to_postgrest());
            }
        }
        Ok(url)
    }

    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let session = self.session.read().await;
        let bearer = session.as_ref().map_or(self.anon_key.as_str(), |s| s.access_token.as_str());
        self.http.request(method, url).header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.or_raise(|| ErrorKind::Network)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = error_message(&body).unwrap_or_else(|| status.to_string());
        tracing::debug!(status = status.as_u16(), %message, "Backend rejected request");
        // The storage API reports missing objects as a 400 with a nested 404.
        if status == StatusCode::NOT_FOUND || body.get("statusCode").and_then(Value::as_str) == Some("404") {
            exn::bail!(ErrorKind::NotFound(message));
        }
        exn::bail!(ErrorKind::Status { status: status.as_u16(), message })
    }

    async fn store_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }
}

/// Error wording from the various response shapes used by GoTrue, PostgREST
/// and the storage API.
fn error_message(body: &Value) -> Option<String> {
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl RemoteBackend for SupabaseBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(backend = %self.name))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut url = self.endpoint(&format!("{AUTH}token"))?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let request = self.request(Method::POST, url).await.json(&json!({ "email": email, "password": password }));
        let session: Session = Self::send(request).await?.json().await.or_raise(|| ErrorKind::InvalidData)?;
        self.store_session(Some(session.clone())).await;
        tracing::info!(user = %session.user.id, "Signed in");
        Ok(session)
    }

    #[instrument(skip_all, fields(backend = %self.name))]
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<Option<Session>> {
        let url = self.endpoint(&format!("{AUTH}signup"))?;
        let body = json!({ "email": email, "password": password, "data": { "display_name": display_name } });
        let request = self.request(Method::POST, url).await.json(&body);
        let response: Value = Self::send(request).await?.json().await.or_raise(|| ErrorKind::InvalidData)?;
        // Projects requiring email confirmation answer with the bare user.
        if response.get("access_token").is_none() {
            tracing::info!("Signed up; confirmation pending");
            return Ok(None);
        }
        let session: Session = serde_json::from_value(response).or_raise(|| ErrorKind::InvalidData)?;
        self.store_session(Some(session.clone())).await;
        tracing::info!(user = %session.user.id, "Signed up");
        Ok(Some(session))
    }

    fn authorize_url(&self, provider: &str) -> Result<String> {
        let mut url = self.endpoint(&format!("{AUTH}authorize"))?;
        url.query_pairs_mut().append_pair("provider", provider);
        Ok(url.into())
    }

    #[instrument(skip_all, fields(backend = %self.name))]
    async fn set_session(&self, access_token: &str, refresh_token: Option<&str>) -> Result<Session> {
        let url = self.endpoint(&format!("{AUTH}user"))?;
        let request = self.http.get(url).header("apikey", &self.anon_key).bearer_auth(access_token);
        let user: User = Self::send(request).await?.json().await.or_raise(|| ErrorKind::InvalidData)?;
        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            user,
        };
        self.store_session(Some(session.clone())).await;
        tracing::info!(user = %session.user.id, "Adopted provider session");
        Ok(session)
    }

    async fn restore_session(&self, session: Session) -> Result<()> {
        tracing::debug!(backend = %self.name, user = %session.user.id, "Restored session");
        self.store_session(Some(session)).await;
        Ok(())
    }

    #[instrument(skip_all, fields(backend = %self.name))]
    async fn refresh_session(&self) -> Result<Session> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .and_then(|session| session.refresh_token.clone())
            .ok_or_raise(|| ErrorKind::Auth("no refresh token".to_string()))?;
        let mut url = self.endpoint(&format!("{AUTH}token"))?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");
        let request = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }));
        let session: Session = Self::send(request).await?.json().await.or_raise(|| ErrorKind::InvalidData)?;
        self.store_session(Some(session.clone())).await;
        tracing::info!(user = %session.user.id, "Refreshed session");
        Ok(session)
    }

    #[instrument(skip_all, fields(backend = %self.name))]
    async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        let url = self.endpoint(&format!("{AUTH}logout"))?;
        let request = self.http.post(url).header("apikey", &self.anon_key).bearer_auth(&session.access_token);
        Self::send(request).await?;
        tracing::info!(user = %session.user.id, "Signed out");
        Ok(())
    }

    async fn session(&self) -> Result<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    #[instrument(skip_all, fields(backend = %self.name, table = table))]
    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>> {
        let mut url = self.table_url(table, filters)?;
        url.query_pairs_mut().append_pair("select", "*");
        let response = Self::send(self.request(Method::GET, url).await).await?;
        response.json().await.or_raise(|| ErrorKind::InvalidData)
    }

    #[instrument(skip_all, fields(backend = %self.name, table = table))]
    async fn insert(&self, table: &str, row: &Row) -> Result<()> {
        let url = self.table_url(table, &[])?;
        let request = self.request(Method::POST, url).await.header("Prefer", "return=minimal").json(row);
        Self::send(request).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(backend = %self.name, table = table))]
    async fn upsert(&self, table: &str, row: &Row, on_conflict: &str) -> Result<()> {
        let mut url = self.table_url(table, &[])?;
        url.query_pairs_mut().append_pair("on_conflict", on_conflict);
        let request = self
            .request(Method::POST, url)
            .await
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row);
        Self::send(request).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(backend = %self.name, table = table))]
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        if filters.is_empty() {
            exn::bail!(ErrorKind::InvalidRequest(format!("unfiltered delete from {table}")));
        }
        let url = self.table_url(table, filters)?;
        Self::send(self.request(Method::DELETE, url).await).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(backend = %self.name, bucket = bucket, name = name))]
    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        let url = self.endpoint(&format!("{STORAGE}{bucket}/{name}"))?;
        let response = Self::send(self.request(Method::GET, url).await).await?;
        let bytes = response.bytes().await.or_raise(|| ErrorKind::Network)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sastra_models::VerseQuery;

    fn backend() -> SupabaseBackend {
        SupabaseBackend::new("https://project.supabase.co", "anon").unwrap()
    }

    #[rstest]
    #[case("https://project.supabase.co")]
    #[case("https://project.supabase.co/")]
    #[case("http://localhost:54321/base")]
    fn test_endpoints_keep_base_path(#[case] base: &str) {
        let backend = SupabaseBackend::new(base, "anon").unwrap();
        let url = backend.endpoint("rest/v1/books").unwrap();
        assert!(url.as_str().starts_with(base.trim_end_matches('/')));
        assert!(url.as_str().ends_with("/rest/v1/books"));
    }

    #[rstest]
    #[case("not a url", "anon")]
    #[case("mailto:reader@example.com", "anon")]
    #[case("https://project.supabase.co", "")]
    fn test_new_rejects_bad_configuration(#[case] url: &str, #[case] key: &str) {
        let err = SupabaseBackend::new(url, key).err().unwrap();
        assert!(matches!(&*err, ErrorKind::InvalidConfig(_)));
    }

    #[test]
    fn test_authorize_url() {
        let url = backend().authorize_url("google").unwrap();
        assert_eq!(url, "https://project.supabase.co/auth/v1/authorize?provider=google");
    }

    #[test]
    fn test_table_url_encodes_filters() {
        let filters = [Filter::Verse(VerseQuery::collection("bg/1"))];
        let url = backend().table_url("gita", &filters).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(url.path(), "/rest/v1/gita");
        assert_eq!(pairs, vec![("verse_url".to_string(), "like.bg/1/*".to_string())]);
    }

    #[rstest]
    #[case(json!({ "code": 400, "msg": "Invalid login credentials" }), Some("Invalid login credentials"))]
    #[case(json!({ "error": "invalid_grant", "error_description": "Email not confirmed" }), Some("Email not confirmed"))]
    #[case(json!({ "statusCode": "404", "error": "not_found", "message": "Object not found" }), Some("Object not found"))]
    #[case(json!({ "hint": null }), None)]
    #[case(Value::Null, None)]
    fn test_error_message(#[case] body: Value, #[case] expected: Option<&str>) {
        assert_eq!(error_message(&body).as_deref(), expected);
    }

    #[tokio::test]
    async fn test_delete_requires_filter() {
        let err = backend().delete("notes", &[]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_refresh_without_session_is_auth_error() {
        let err = backend().refresh_session().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Auth(_)));
    }

    #[tokio::test]
    async fn test_restore_session_is_local() {
        let backend = backend();
        let session: Session = serde_json::from_value(json!({
            "access_token": "jwt",
            "refresh_token": "refresh",
            "user": { "id": "b7c1" }
        }))
        .unwrap();
        backend.restore_session(session.clone()).await.unwrap();
        assert_eq!(backend.session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_noop() {
        let backend = backend();
        backend.sign_out().await.unwrap();
        assert!(backend.session().await.unwrap().is_none());
    }
}
