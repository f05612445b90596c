//! Database repository for sessions.

use crate::{
    api::models::users::CurrentUser,
    db::{
        errors::Result,
        models::sessions::{SessionCreateDBRequest, SessionDBResponse},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, types::Json};
use tracing::instrument;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Session {
    pub id: String,
    pub user_snapshot: Json<CurrentUser>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<Session> for SessionDBResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            user: session.user_snapshot.0,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

pub struct Sessions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Sessions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip_all, fields(username = %request.user.username), err)]
    pub async fn create(&mut self, request: &SessionCreateDBRequest) -> Result<SessionDBResponse> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_snapshot, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_snapshot, created_at, expires_at
            "#,
        )
        .bind(&request.id)
        .bind(Json(&request.user))
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(session.into())
    }

    /// Fetch a session that has not yet expired.
    #[instrument(skip_all, err)]
    pub async fn get_active(&mut self, id: &str) -> Result<Option<SessionDBResponse>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_snapshot, created_at, expires_at FROM sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(session.map(Into::into))
    }

    /// Delete a session. Returns whether a row was removed.
    #[instrument(skip_all, err)]
    pub async fn delete(&mut self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every expired session, returning how many were removed.
    #[instrument(skip(self), err)]
    pub async fn purge_expired(&mut self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
