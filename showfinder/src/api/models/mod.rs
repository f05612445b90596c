//! Request and response data models.
//!
//! These structures are the contract between the route handlers and the outside world: form
//! bodies coming in, the upstream event payload, and the user snapshot carried in a session.
//! Database records live separately in [`crate::db::models`].
//!
//! - [`auth`]: Registration and login submissions
//! - [`events`]: Upstream event-search payload and the flattened form shown on the discover page
//! - [`users`]: The authenticated user as seen by handlers

pub mod auth;
pub mod events;
pub mod users;
