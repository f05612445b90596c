use axum::{extract::State, response::Html};
use serde_json::json;
use tracing::{debug, error};

use crate::{AppState, api::handlers::render, api::models::users::CurrentUser, errors::Error, views};

pub const FETCH_FAILED: &str = "Failed to fetch data from Ticketmaster API. Please try again later.";

/// List upcoming events for the signed-in user.
///
/// An upstream failure still renders the page, with no results and an explanatory message.
#[tracing::instrument(skip_all, fields(username = %user.username))]
pub async fn discover(State(state): State<AppState>, user: CurrentUser) -> Result<Html<String>, Error> {
    let (results, message) = match state.events.search().await {
        Ok(events) => {
            debug!(count = events.len(), "Rendering events");
            (events, "")
        }
        Err(e) => {
            error!("Event search failed: {:#}", e);
            (Vec::new(), FETCH_FAILED)
        }
    };

    render(
        &state,
        views::DISCOVER,
        json!({
            "user": user,
            "results": results,
            "message": message,
        }),
    )
}
