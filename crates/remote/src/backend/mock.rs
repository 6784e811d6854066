//! In-memory remote backend for testing.

use super::{Filter, RemoteBackend};
use crate::error::{ErrorKind, Result};
use crate::models::{Session, User};
use async_trait::async_trait;
use sastra_models::Row;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory remote backend for testing.
///
/// Tables, objects and accounts live in maps behind locks, so all trait
/// methods operate on `&self`. Every call is recorded (see
/// [`calls`](Self::calls)) and individual operations can be made to fail
/// (see [`failing`](Self::failing)).
///
/// `verse_url` prefix filters are evaluated the way SQL `LIKE` would, `_`
/// included, so callers that rely on exact prefix matching have to filter the
/// results themselves just as they would against a real backend.
///
/// # Examples
///
/// Needs the `mock` feature outside this crate's own tests.
///
/// ```ignore
/// use sastra_remote::backend::{Filter, MockBackend, RemoteBackend};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::default().with_rows("books", [json!({ "code": "gita" })]);
/// let rows = backend.select("books", &[Filter::eq("code", "gita")]).await?;
/// assert_eq!(rows.len(), 1);
/// assert_eq!(backend.calls(), vec!["select books"]);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    tables: RwLock<HashMap<String, Vec<Row>>>,
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    accounts: RwLock<HashMap<String, (String, User)>>,
    session: RwLock<Option<Session>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicI64,
    token_expired: AtomicBool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            tables: RwLock::default(),
            objects: RwLock::default(),
            accounts: RwLock::default(),
            session: RwLock::default(),
            failing: HashSet::new(),
            delay: None,
            calls: Mutex::default(),
            next_id: AtomicI64::new(1),
            token_expired: AtomicBool::new(false),
        }
    }
}

impl MockBackend {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append rows to a table.
    ///
    /// Panics if a value isn't a JSON object. If test setup is wrong, then
    /// test should not pass.
    pub fn with_rows(mut self, table: &str, rows: impl IntoIterator<Item = Value>) -> Self {
        let entries = self.tables.get_mut().entry(table.to_string()).or_default();
        for row in rows {
            let Value::Object(row) = row else {
                panic!("MockBackend::with_rows: {table} row is not an object");
            };
            entries.push(row);
        }
        self
    }

    pub fn with_object(mut self, bucket: &str, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.objects.get_mut().insert((bucket.to_string(), name.to_string()), data.into());
        self
    }

    /// Register an account. `role` ends up in the user's app metadata.
    pub fn with_account(mut self, email: &str, password: &str, role: Option<&str>) -> Self {
        let user = mock_user(email, role);
        self.accounts.get_mut().insert(email.to_string(), (password.to_string(), user));
        self
    }

    /// Start out signed in as a user with the given role.
    pub fn signed_in(mut self, email: &str, role: Option<&str>) -> Self {
        *self.session.get_mut() = Some(mock_session(mock_user(email, role)));
        self
    }

    /// Reject table and storage calls with a 401 until the session is
    /// refreshed.
    pub fn with_expired_token(mut self) -> Self {
        *self.token_expired.get_mut() = true;
        self
    }

    /// Make an operation fail with a 500. `operation` is the method name, e.g.
    /// `"select"` or `"sign_in"`.
    pub fn failing(mut self, operation: &str) -> Self {
        self.failing.insert(operation.to_string());
        self
    }

    /// Delay every call, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls made so far, as `"<operation> <target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Snapshot of a table's rows.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    async fn enter(&self, operation: &str, target: &str) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(format!("{operation} {target}").trim_end().to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(operation) {
            exn::bail!(ErrorKind::Status { status: 500, message: format!("mock {operation} failure") });
        }
        Ok(())
    }

    /// [`enter`](Self::enter) for calls that send the access token.
    async fn enter_authorized(&self, operation: &str, target: &str) -> Result<()> {
        self.enter(operation, target).await?;
        if self.token_expired.load(Ordering::Relaxed) && self.session.read().await.is_some() {
            exn::bail!(ErrorKind::Status { status: 401, message: "JWT expired".to_string() });
        }
        Ok(())
    }
}

fn mock_user(email: &str, role: Option<&str>) -> User {
    let mut app_metadata = Map::new();
    if let Some(role) = role {
        app_metadata.insert("role".to_string(), Value::from(role));
    }
    User {
        id: format!("user-{email}"),
        email: Some(email.to_string()),
        app_metadata,
        user_metadata: Map::new(),
    }
}

fn mock_session(user: User) -> Session {
    Session { access_token: format!("token-{}", user.id), refresh_token: Some(format!("refresh-{}", user.id)), user }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Verse(query) if query.collection => row
            .get(query.column())
            .and_then(Value::as_str)
            .is_some_and(|url| like(&query.sql_parameter(), url)),
        other => other.matches(row),
    })
}

/// SQL `LIKE` with `%` and `_` wildcards, case-sensitive.
fn like(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    fn go(p: &[char], t: &[char]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some(('%', rest)) => (0..=t.len()).any(|skip| go(rest, &t[skip..])),
            Some(('_', rest)) => !t.is_empty() && go(rest, &t[1..]),
            Some((c, rest)) => t.first() == Some(c) && go(rest, &t[1..]),
        }
    }
    go(&pattern, &text)
}

#[async_trait]
impl RemoteBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.enter("sign_in", email).await?;
        let session = match self.accounts.read().await.get(email) {
            Some((expected, user)) if expected == password => mock_session(user.clone()),
            _ => exn::bail!(ErrorKind::Status { status: 400, message: "Invalid login credentials".to_string() }),
        };
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<Option<Session>> {
        self.enter("sign_up", email).await?;
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            exn::bail!(ErrorKind::Status { status: 422, message: "User already registered".to_string() });
        }
        let mut user = mock_user(email, None);
        user.user_metadata.insert("display_name".to_string(), Value::from(display_name));
        accounts.insert(email.to_string(), (password.to_string(), user.clone()));
        let session = mock_session(user);
        *self.session.write().await = Some(session.clone());
        Ok(Some(session))
    }

    fn authorize_url(&self, provider: &str) -> Result<String> {
        if self.failing.contains("authorize_url") {
            exn::bail!(ErrorKind::Status { status: 400, message: format!("Unsupported provider: {provider}") });
        }
        Ok(format!("mock://auth/v1/authorize?provider={provider}"))
    }

    async fn set_session(&self, access_token: &str, refresh_token: Option<&str>) -> Result<Session> {
        self.enter("set_session", "").await?;
        let user = self
            .accounts
            .read()
            .await
            .values()
            .map(|(_, user)| user)
            .find(|user| format!("token-{}", user.id) == access_token)
            .cloned();
        let Some(user) = user else {
            exn::bail!(ErrorKind::Status { status: 401, message: "invalid JWT".to_string() });
        };
        let session =
            Session { access_token: access_token.to_string(), refresh_token: refresh_token.map(str::to_string), user };
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn restore_session(&self, session: Session) -> Result<()> {
        self.enter("restore_session", "").await?;
        *self.session.write().await = Some(session);
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session> {
        self.enter("refresh_session", "").await?;
        let mut session = self.session.write().await;
        let Some(current) = session.as_mut() else {
            exn::bail!(ErrorKind::Auth("no session".to_string()));
        };
        if current.refresh_token.is_none() {
            exn::bail!(ErrorKind::Auth("no refresh token".to_string()));
        }
        current.access_token = format!("token-{}-refreshed", current.user.id);
        self.token_expired.store(false, Ordering::Relaxed);
        Ok(current.clone())
    }

    async fn sign_out(&self) -> Result<()> {
        self.enter("sign_out", "").await?;
        *self.session.write().await = None;
        Ok(())
    }

    async fn session(&self) -> Result<Option<Session>> {
        self.enter("session", "").await?;
        Ok(self.session.read().await.clone())
    }

    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>> {
        self.enter_authorized("select", table).await?;
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            exn::bail!(ErrorKind::NotFound(format!("relation \"{table}\" does not exist")));
        };
        Ok(rows.iter().filter(|row| matches_all(row, filters)).cloned().collect())
    }

    async fn insert(&self, table: &str, row: &Row) -> Result<()> {
        self.enter_authorized("insert", table).await?;
        let mut row = row.clone();
        if !row.contains_key("id") {
            row.insert("id".to_string(), Value::from(self.next_id.fetch_add(1, Ordering::Relaxed)));
        }
        self.tables.write().await.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    async fn upsert(&self, table: &str, row: &Row, on_conflict: &str) -> Result<()> {
        self.enter_authorized("upsert", table).await?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        let existing = row
            .get(on_conflict)
            .and_then(|key| rows.iter_mut().find(|candidate| candidate.get(on_conflict) == Some(key)));
        match existing {
            Some(existing) => existing.extend(row.clone()),
            None => rows.push(row.clone()),
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        self.enter_authorized("delete", table).await?;
        if filters.is_empty() {
            exn::bail!(ErrorKind::InvalidRequest(format!("unfiltered delete from {table}")));
        }
        if let Some(rows) = self.tables.write().await.get_mut(table) {
            rows.retain(|row| !matches_all(row, filters));
        }
        Ok(())
    }

    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        self.enter_authorized("download", &format!("{bucket}/{name}")).await?;
        let objects = self.objects.read().await;
        match objects.get(&(bucket.to_string(), name.to_string())) {
            Some(data) => Ok(data.clone()),
            None => exn::bail!(ErrorKind::NotFound(format!("{bucket}/{name}"))),
        }
    }
}
