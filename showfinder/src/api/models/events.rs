//! Event search payloads.
//!
//! The upstream response is large and loosely specified, so only the fields the discover page
//! shows are modelled, all optional. Anything else in the payload is ignored.

use serde::{Deserialize, Serialize};

/// Top-level upstream search response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EventsResponse {
    /// Absent when the search matched nothing
    #[serde(rename = "_embedded", default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<EmbeddedEvents>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EmbeddedEvents {
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Event {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub images: Vec<EventImage>,
    #[serde(default)]
    pub dates: Option<EventDates>,
    #[serde(rename = "_embedded", default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<EventEmbedded>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EventImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EventDates {
    #[serde(default)]
    pub start: Option<EventStart>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStart {
    #[serde(default)]
    pub local_date: Option<String>,
    #[serde(default)]
    pub local_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EventEmbedded {
    #[serde(default)]
    pub venues: Vec<Venue>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Venue {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<City>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct City {
    #[serde(default)]
    pub name: Option<String>,
}

impl EventsResponse {
    /// The result set. A response without `_embedded` has no results.
    pub fn into_events(self) -> Vec<Event> {
        self.embedded.map(|e| e.events).unwrap_or_default()
    }
}

/// One result row on the discover page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub name: String,
    pub url: Option<String>,
    pub image: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub venue: Option<String>,
}

impl From<Event> for EventSummary {
    fn from(event: Event) -> Self {
        // Widest image, so the card never upscales a thumbnail
        let image = event
            .images
            .iter()
            .max_by_key(|image| image.width.unwrap_or(0))
            .map(|image| image.url.clone());

        let start = event.dates.and_then(|d| d.start).unwrap_or_default();

        let venue = event.embedded.and_then(|e| e.venues.into_iter().next()).and_then(|venue| {
            match (venue.name, venue.city.and_then(|c| c.name)) {
                (Some(name), Some(city)) => Some(format!("{name}, {city}")),
                (Some(name), None) => Some(name),
                (None, city) => city,
            }
        });

        Self {
            name: event.name.unwrap_or_else(|| "Untitled event".to_string()),
            url: event.url,
            image,
            date: start.local_date,
            time: start.local_time,
            venue,
        }
    }
}
