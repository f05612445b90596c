use axum::{
    extract::State,
    http::{HeaderMap, header::SET_COOKIE},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::{
    AppState,
    api::{
        handlers::render,
        models::{
            auth::{LoginRequest, RegisterRequest},
            users::CurrentUser,
        },
    },
    auth::{
        current_user::{AuthenticatedSession, session_id_from_headers},
        password::{self, Argon2Params},
        session,
    },
    db::models::users::{UserCreateDBRequest, UserDBResponse},
    errors::Error,
    views,
};

pub const INCORRECT_CREDENTIALS: &str = "Incorrect username or password.";
pub const LOGIN_FAILED: &str = "An error occurred. Please try again.";
pub const LOGGED_OUT: &str = "Logged out successfully.";

/// Longest username the `users` table accepts
const MAX_USERNAME_LEN: usize = 50;

pub async fn landing() -> Redirect {
    Redirect::to("/login")
}

#[tracing::instrument(skip_all)]
pub async fn register_page(State(state): State<AppState>) -> Result<Html<String>, Error> {
    render(&state, views::REGISTER, json!({}))
}

/// Register a new account.
///
/// Success always lands on `/login`; any failure lands back on `/register`.
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, submission: Result<RegisterRequest, Error>) -> Redirect {
    let result = match submission {
        Ok(request) => create_user(&state, request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(user) => {
            info!(username = %user.username, "Registered new user");
            Redirect::to("/login")
        }
        Err(e @ (Error::BadRequest { .. } | Error::PayloadTooLarge { .. })) => {
            debug!("Registration rejected: {}", e);
            Redirect::to("/register")
        }
        Err(Error::Database(e)) if e.is_unique_violation() => {
            info!("Registration rejected: username already taken");
            Redirect::to("/register")
        }
        Err(e) => {
            error!("Registration error: {:#}", e);
            Redirect::to("/register")
        }
    }
}

async fn create_user(state: &AppState, request: RegisterRequest) -> Result<UserDBResponse, Error> {
    let Some((username, password)) = request.credentials() else {
        return Err(Error::BadRequest {
            message: "Username and password are required".to_string(),
        });
    };

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(Error::BadRequest {
            message: format!("Username must be at most {MAX_USERNAME_LEN} characters"),
        });
    }

    if let Some(image) = &request.image {
        state.uploads.validate(image)?;
    }

    let password_hash = password::hash_password(password.to_string(), Argon2Params::from(&state.config.password)).await?;

    let stored = match &request.image {
        Some(image) => Some(state.uploads.store(image).await?),
        None => None,
    };

    let create = UserCreateDBRequest {
        username: username.to_string(),
        password_hash,
        profile_image: stored.as_ref().map(|s| s.public_path.clone()),
    };

    match state.users.insert_user(&create).await {
        Ok(user) => Ok(user),
        Err(e) => {
            if let Some(stored) = &stored {
                state.uploads.discard(stored).await;
            }
            Err(e.into())
        }
    }
}

#[tracing::instrument(skip_all)]
pub async fn login_page(State(state): State<AppState>) -> Result<Html<String>, Error> {
    render(&state, views::LOGIN, json!({}))
}

fn login_message(state: &AppState, message: &str) -> Result<Response, Error> {
    Ok(render(state, views::LOGIN, json!({ "message": message }))?.into_response())
}

/// Log in with a username and password.
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, headers: HeaderMap, submission: Result<LoginRequest, Error>) -> Result<Response, Error> {
    let request = match submission {
        Ok(request) => request,
        Err(e) => {
            debug!("Unreadable login body: {}", e);
            return login_message(&state, INCORRECT_CREDENTIALS);
        }
    };

    let Some((username, password)) = request.credentials() else {
        debug!("Login attempt with missing credentials");
        return login_message(&state, INCORRECT_CREDENTIALS);
    };

    let user = match state.users.find_user_by_username(username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!("Login attempt for unknown user");
            if state.config.auth.unknown_user_redirects_to_register {
                return Ok(Redirect::to("/register").into_response());
            }
            return login_message(&state, INCORRECT_CREDENTIALS);
        }
        Err(e) => {
            error!("Failed to look up user during login: {:#}", e);
            return login_message(&state, LOGIN_FAILED);
        }
    };

    match password::verify_password(password.to_string(), user.password_hash.clone()).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(username = %user.username, "Login attempt with wrong password");
            return login_message(&state, INCORRECT_CREDENTIALS);
        }
        Err(e) => {
            warn!(username = %user.username, "Stored password hash could not be verified: {}", e);
            return login_message(&state, INCORRECT_CREDENTIALS);
        }
    }

    // A fresh login replaces whatever session the browser already had
    if let Some(previous) = session_id_from_headers(&headers, &state) {
        if let Err(e) = state.sessions.destroy(&previous).await {
            warn!("Failed to end previous session on login: {:#}", e);
        }
    }

    let session_id = match state.sessions.create(&CurrentUser::from(&user)).await {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to create session: {:#}", e);
            return login_message(&state, LOGIN_FAILED);
        }
    };

    let secret = state.config.session.secret.as_deref().ok_or_else(|| Error::Internal {
        operation: "sign session cookie: no session secret configured".to_string(),
    })?;
    let token = session::sign_session_id(&session_id, secret)?;

    info!(username = %user.username, "User logged in");
    Ok(([(SET_COOKIE, state.config.session.cookie(&token))], Redirect::to("/discover")).into_response())
}

/// End the current session and clear the cookie.
#[tracing::instrument(skip_all, fields(username = %session.user.username))]
pub async fn logout(State(state): State<AppState>, session: AuthenticatedSession) -> Result<Response, Error> {
    if let Err(e) = state.sessions.destroy(&session.id).await {
        error!("Failed to destroy session: {:#}", e);
        if state.config.auth.logout_error_redirects_to_discover {
            return Ok(Redirect::to("/discover").into_response());
        }
    } else {
        info!("User logged out");
    }

    let page = render(&state, views::LOGOUT, json!({ "message": LOGGED_OUT }))?;
    Ok(([(SET_COOKIE, state.config.session.expired_cookie())], page).into_response())
}
