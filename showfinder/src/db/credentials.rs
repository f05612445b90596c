//! The credential store seam.
//!
//! Handlers talk to [`CredentialStore`] rather than to a pool, so tests can swap in an in-memory
//! implementation without a database.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::{
    errors::Result,
    handlers::Users,
    models::users::{UserCreateDBRequest, UserDBResponse},
};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new user. Fails with `UniqueViolation` if the username is taken.
    async fn insert_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    /// Look up a user by exact username.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>>;
}

/// [`CredentialStore`] backed by the `users` table.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).create(request).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_user_by_username(username).await
    }
}
