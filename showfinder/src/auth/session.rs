//! Server-side sessions and the signed cookie that points at them.
//!
//! A session id is 256 random bits, base64url encoded. The cookie carries
//! `{id}.{signature}` where the signature is an HMAC-SHA256 of the id keyed by the configured
//! session secret; a cookie whose signature does not verify is ignored before any store lookup.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rand::prelude::RngExt;
use rand::rng;
use sha2::Sha256;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::{
    api::models::users::CurrentUser,
    db::{
        errors::{DbError, Result},
        handlers::Sessions,
        models::sessions::SessionCreateDBRequest,
    },
    errors::Error,
};

type HmacSha256 = Hmac<Sha256>;

/// Where sessions live. Implementations must treat an expired session exactly like an unknown
/// one.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a session for `user` and return its id.
    async fn create(&self, user: &CurrentUser) -> Result<String>;

    /// The user snapshot for a live session, or `None` if it is unknown or expired.
    async fn lookup(&self, id: &str) -> Result<Option<CurrentUser>>;

    /// End a session. Ending an unknown session succeeds.
    async fn destroy(&self, id: &str) -> Result<()>;
}

/// Generate a fresh session id: 32 bytes of OS randomness, base64url without padding.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Produce the cookie value for a session id.
pub fn sign_session_id(id: &str, secret: &str) -> std::result::Result<String, Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| Error::Internal {
        operation: format!("initialise session signer: {e}"),
    })?;
    mac.update(id.as_bytes());
    let signature = mac.finalize().into_bytes();
    Ok(format!("{id}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

/// Recover the session id from a cookie value, if its signature is valid.
pub fn verify_session_token(token: &str, secret: &str) -> Option<String> {
    let (id, signature) = token.rsplit_once('.')?;
    if id.is_empty() {
        return None;
    }
    let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(id.as_bytes());
    // verify_slice compares in constant time
    mac.verify_slice(&signature).ok()?;

    Some(id.to_string())
}

fn expiry_from_now(ttl: Duration) -> Result<DateTime<Utc>> {
    let ttl = TimeDelta::from_std(ttl).map_err(|e| DbError::Other(anyhow::anyhow!("session timeout out of range: {e}")))?;
    Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| DbError::Other(anyhow::anyhow!("session expiry overflows")))
}

/// Sessions held in process memory. Lost on restart and not shared between processes.
pub struct InMemorySessionStore {
    sessions: DashMap<String, (CurrentUser, DateTime<Utc>)>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Number of sessions held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn purge_expired(&self) {
        let now = Utc::now();
        self.sessions.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    #[instrument(skip_all, fields(username = %user.username), err)]
    async fn create(&self, user: &CurrentUser) -> Result<String> {
        self.purge_expired();
        let id = generate_session_id();
        let expires_at = expiry_from_now(self.ttl)?;
        self.sessions.insert(id.clone(), (user.clone(), expires_at));
        Ok(id)
    }

    async fn lookup(&self, id: &str) -> Result<Option<CurrentUser>> {
        let now = Utc::now();
        let user = self
            .sessions
            .get(id)
            .filter(|entry| entry.value().1 > now)
            .map(|entry| entry.value().0.clone());
        Ok(user)
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

/// Sessions persisted in the `sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    ttl: Duration,
}

impl PgSessionStore {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    #[instrument(skip_all, fields(username = %user.username), err)]
    async fn create(&self, user: &CurrentUser) -> Result<String> {
        let mut conn = self.pool.acquire().await?;
        let mut repo = Sessions::new(&mut conn);

        let purged = repo.purge_expired().await?;
        if purged > 0 {
            debug!(purged, "Removed expired sessions");
        }

        let session = repo
            .create(&SessionCreateDBRequest {
                id: generate_session_id(),
                user: user.clone(),
                expires_at: expiry_from_now(self.ttl)?,
            })
            .await?;

        Ok(session.id)
    }

    async fn lookup(&self, id: &str) -> Result<Option<CurrentUser>> {
        let mut conn = self.pool.acquire().await?;
        let session = Sessions::new(&mut conn).get_active(id).await?;
        Ok(session.map(|s| s.user))
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Sessions::new(&mut conn).delete(id).await?;
        Ok(())
    }
}
