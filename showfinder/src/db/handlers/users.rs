//! Database repository for users.

use crate::db::{
    errors::Result,
    models::users::{UserCreateDBRequest, UserDBResponse},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            password_hash: user.password,
            profile_image: user.profile_image,
            created_at: user.created_at,
        }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a user. A taken username surfaces as [`crate::db::errors::DbError::UniqueViolation`].
    #[instrument(skip(self, request), fields(username = %request.username), err)]
    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, profile_image)
            VALUES ($1, $2, $3)
            RETURNING id, username, password, profile_image, created_at
            "#,
        )
        .bind(&request.username)
        .bind(&request.password_hash)
        .bind(&request.profile_image)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user.into())
    }

    #[instrument(skip(self), err)]
    pub async fn get_user_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, profile_image, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user.map(Into::into))
    }
}
