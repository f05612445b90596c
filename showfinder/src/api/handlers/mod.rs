//! HTTP request handlers.
//!
//! Account handlers never answer with an error status for bad input: validation and store
//! failures end in a redirect or a re-rendered form, and the detail goes to the log. Only a
//! failure to render a page surfaces as [`crate::errors::Error`].
//!
//! - [`auth`]: Landing redirect, registration, login and logout
//! - [`discover`]: The event listing behind the session gate
//! - [`probes`]: Welcome and health endpoints

use axum::response::Html;
use serde_json::Value;

use crate::{AppState, errors::Error};

pub mod auth;
pub mod discover;
pub mod probes;

/// Render a template through the application's view renderer.
pub(crate) fn render(state: &AppState, template: &str, context: Value) -> Result<Html<String>, Error> {
    state.views.render(template, context).map(Html)
}
