//! Database models for sessions.

use chrono::{DateTime, Utc};

use crate::api::models::users::CurrentUser;

/// Database request for persisting a new session
#[derive(Debug, Clone)]
pub struct SessionCreateDBRequest {
    pub id: String,
    pub user: CurrentUser,
    pub expires_at: DateTime<Utc>,
}

/// Database response for a session
#[derive(Debug, Clone)]
pub struct SessionDBResponse {
    pub id: String,
    pub user: CurrentUser,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
