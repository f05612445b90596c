//! API models for users.

use crate::db::models::users::UserDBResponse;
use serde::{Deserialize, Serialize};

/// The user attached to an authenticated request.
///
/// This is the snapshot stored in the session at login time. It is never refreshed from the
/// credential store, and it never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub username: String,
    pub profile_image: Option<String>,
}

impl From<UserDBResponse> for CurrentUser {
    fn from(user: UserDBResponse) -> Self {
        Self {
            username: user.username,
            profile_image: user.profile_image,
        }
    }
}

impl From<&UserDBResponse> for CurrentUser {
    fn from(user: &UserDBResponse) -> Self {
        Self {
            username: user.username.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}
