use crate::{AppState, auth::current_user::authenticate};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

/// Gate for protected routes.
///
/// Requests without a live session are redirected to `/login` and never reach the handler.
/// Authenticated requests carry an [`crate::auth::current_user::AuthenticatedSession`] in their
/// extensions.
pub async fn require_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    match authenticate(request.headers(), &state).await {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => {
            debug!(path = %request.uri().path(), "Anonymous request to protected route");
            Redirect::to("/login").into_response()
        }
    }
}
