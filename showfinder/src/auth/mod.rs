//! Authentication: password hashing, server-side sessions and the route gate.
//!
//! # Flow
//!
//! 1. `POST /login` verifies the password against the stored Argon2 hash ([`password`]).
//! 2. A session is created in the configured [`session::SessionStore`] holding a snapshot of
//!    the user, and its id is handed to the browser in a signed, HTTP-only cookie.
//! 3. Protected routes sit behind [`middleware::require_session`], which verifies the cookie,
//!    looks the session up, and either redirects to `/login` or attaches the session to the
//!    request.
//! 4. Handlers read it back with the [`current_user`] extractors.
//!
//! ```ignore
//! use showfinder::api::models::users::CurrentUser;
//!
//! async fn protected_handler(user: CurrentUser) -> String {
//!     format!("Hello, {}!", user.username)
//! }
//! ```
//!
//! # Modules
//!
//! - [`current_user`]: Cookie parsing and extractors for the authenticated user
//! - [`middleware`]: Route protection middleware
//! - [`password`]: Password hashing and verification using Argon2
//! - [`session`]: Session stores and cookie signing

pub mod current_user;
pub mod middleware;
pub mod password;
pub mod session;
