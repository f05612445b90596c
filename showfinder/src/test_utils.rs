//! Test utilities: in-memory and failing collaborators, and helpers for driving the router.

use std::{
    sync::{
        Arc, Once,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum_test::{TestResponse, TestServer};
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use tempfile::TempDir;

use crate::{
    AppState,
    api::models::{events::EventSummary, users::CurrentUser},
    auth::session::{InMemorySessionStore, SessionStore},
    build_router,
    config::{Config, SessionStoreKind},
    db::{
        credentials::CredentialStore,
        errors::{DbError, Result},
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
    discovery::{EventSearch, StaticEvents},
    uploads::UploadStore,
    views::Views,
};

pub const TEST_SESSION_SECRET: &str = "test-session-secret-for-testing-only";

/// Install the process-wide rustls provider, as `main` does at startup.
pub fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Test configuration with its own uploads directory. The directory is removed when the
/// returned `TempDir` is dropped, so keep it alive for the whole test.
pub fn create_test_config() -> (Config, TempDir) {
    let uploads = tempfile::Builder::new()
        .prefix("showfinder-test-uploads-")
        .tempdir()
        .expect("Failed to create upload dir");
    let mut config = Config::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config.session.secret = Some(TEST_SESSION_SECRET.to_string());
    config.session.store = SessionStoreKind::Memory;
    // Cheap hashing keeps the handler tests fast
    config.password.argon2_memory_kib = 1024;
    config.password.argon2_iterations = 1;
    config.password.argon2_parallelism = 1;
    config.uploads.dir = uploads.path().to_path_buf();
    (config, uploads)
}

/// State around in-memory stores and an upstream with no events.
pub fn test_state(config: Config) -> AppState {
    AppState::builder()
        .uploads(UploadStore::new(&config.uploads))
        .sessions(Arc::new(InMemorySessionStore::new(config.session.timeout)))
        .config(config)
        .users(Arc::new(InMemoryCredentialStore::default()))
        .events(Arc::new(StaticEvents::new(Vec::new())))
        .views(Arc::new(Views::new().expect("Failed to load templates")))
        .build()
}

pub fn server_for(state: AppState) -> TestServer {
    TestServer::new(build_router(state)).expect("Failed to create test server")
}

pub fn create_test_server(config: Config) -> (TestServer, AppState) {
    let state = test_state(config);
    (server_for(state.clone()), state)
}

/// The `Location` header of a redirect, or an empty string.
pub fn location(response: &TestResponse) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// The `name=value` pair from a response's `Set-Cookie` header, ready to send back as a
/// `Cookie` header. `None` if no cookie was set or it was cleared.
pub fn session_cookie(response: &TestResponse) -> Option<String> {
    let set_cookie = response.headers().get("set-cookie")?.to_str().ok()?;
    let pair = set_cookie.split(';').next()?.trim();
    let (_, value) = pair.split_once('=')?;
    (!value.is_empty()).then(|| pair.to_string())
}

/// Register and log in, returning the session cookie.
pub async fn login_as(server: &TestServer, username: &str, password: &str) -> String {
    let form = serde_json::json!({ "username": username, "password": password });
    server.post("/register").form(&form).await;
    let response = server.post("/login").form(&form).await;
    session_cookie(&response).expect("login did not set a session cookie")
}

/// Credential store over a concurrent map, enforcing username uniqueness like the `users` table.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: DashMap<String, UserDBResponse>,
    next_id: AtomicI64,
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        match self.users.entry(request.username.clone()) {
            Entry::Occupied(_) => Err(DbError::UniqueViolation {
                constraint: Some("users_username_key".to_string()),
                table: Some("users".to_string()),
                message: format!("duplicate key value violates unique constraint: {}", request.username),
            }),
            Entry::Vacant(entry) => {
                let user = UserDBResponse {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
                    username: request.username.clone(),
                    password_hash: request.password_hash.clone(),
                    profile_image: request.profile_image.clone(),
                    created_at: Utc::now(),
                };
                entry.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.users.get(username).map(|u| u.clone()))
    }
}

fn unavailable() -> DbError {
    DbError::Other(anyhow::anyhow!("connection refused"))
}

/// Credential store whose every call fails as if the database were down.
pub struct FailingCredentialStore;

#[async_trait]
impl CredentialStore for FailingCredentialStore {
    async fn insert_user(&self, _request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        Err(unavailable())
    }

    async fn find_user_by_username(&self, _username: &str) -> Result<Option<UserDBResponse>> {
        Err(unavailable())
    }
}

/// Session store whose every call fails.
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn create(&self, _user: &CurrentUser) -> Result<String> {
        Err(unavailable())
    }

    async fn lookup(&self, _id: &str) -> Result<Option<CurrentUser>> {
        Err(unavailable())
    }

    async fn destroy(&self, _id: &str) -> Result<()> {
        Err(unavailable())
    }
}

/// Session store that works until asked to end a session.
pub struct DestroyFailsSessionStore {
    inner: InMemorySessionStore,
}

impl Default for DestroyFailsSessionStore {
    fn default() -> Self {
        Self {
            inner: InMemorySessionStore::new(Duration::from_secs(3600)),
        }
    }
}

#[async_trait]
impl SessionStore for DestroyFailsSessionStore {
    async fn create(&self, user: &CurrentUser) -> Result<String> {
        self.inner.create(user).await
    }

    async fn lookup(&self, id: &str) -> Result<Option<CurrentUser>> {
        self.inner.lookup(id).await
    }

    async fn destroy(&self, _id: &str) -> Result<()> {
        Err(unavailable())
    }
}

/// Upstream that always fails.
pub struct FailingEvents;

#[async_trait]
impl EventSearch for FailingEvents {
    async fn search(&self) -> anyhow::Result<Vec<EventSummary>> {
        Err(anyhow::anyhow!("upstream unavailable"))
    }
}
