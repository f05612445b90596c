use crate::{AppState, api::models::users::CurrentUser, auth::session, errors::Error};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::COOKIE, request::Parts},
};
use tracing::{instrument, trace, warn};

/// A live session attached to a request by [`crate::auth::middleware::require_session`].
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub id: String,
    pub user: CurrentUser,
}

/// Find the raw session cookie value in the request headers.
fn session_cookie<'h>(headers: &'h HeaderMap, cookie_name: &str) -> Option<&'h str> {
    for header in headers.get_all(COOKIE) {
        let Ok(cookie_str) = header.to_str() else {
            trace!("Ignoring non-ASCII cookie header");
            continue;
        };
        for cookie in cookie_str.split(';') {
            if let Some((name, value)) = cookie.trim().split_once('=') {
                if name == cookie_name && !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// The session id carried by the request, if its cookie is present and correctly signed.
pub fn session_id_from_headers(headers: &HeaderMap, state: &AppState) -> Option<String> {
    let session_config = &state.config.session;
    let token = session_cookie(headers, &session_config.cookie_name)?;
    let secret = session_config.secret.as_deref()?;

    let id = session::verify_session_token(token, secret);
    if id.is_none() {
        trace!("Session cookie signature did not verify");
    }
    id
}

/// Resolve the request's session against the session store.
///
/// Anything short of a live session is anonymous, including a store failure, which is logged.
#[instrument(skip_all)]
pub async fn authenticate(headers: &HeaderMap, state: &AppState) -> Option<AuthenticatedSession> {
    let id = session_id_from_headers(headers, state)?;

    match state.sessions.lookup(&id).await {
        Ok(Some(user)) => Some(AuthenticatedSession { id, user }),
        Ok(None) => {
            trace!("Session is unknown or expired");
            None
        }
        Err(e) => {
            warn!("Session lookup failed, treating request as anonymous: {:#}", e);
            None
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedSession
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedSession>()
            .cloned()
            .ok_or(Error::Unauthenticated { message: None })
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        AuthenticatedSession::from_request_parts(parts, state).await.map(|session| session.user)
    }
}
