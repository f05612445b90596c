//! Event search against the upstream discovery API.
use crate::{
    api::models::events::{EventSummary, EventsResponse},
    config::DiscoveryConfig,
};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::{Client, header::ACCEPT};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// A trait for searching upcoming events.
///
/// In practice this is [`TicketmasterClient`]; tests substitute canned or failing
/// implementations.
#[async_trait]
pub trait EventSearch: Send + Sync {
    async fn search(&self) -> anyhow::Result<Vec<EventSummary>>;
}

/// Searches the Ticketmaster Discovery v2 events endpoint with a fixed keyword and page size.
pub struct TicketmasterClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    keyword: String,
    size: u32,
    request_timeout: Option<Duration>,
}

impl TicketmasterClient {
    /// Build the client. A rustls crypto provider must already be installed process-wide.
    pub fn new(config: &DiscoveryConfig) -> anyhow::Result<Self> {
        let client = Client::builder().build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            keyword: config.keyword.clone(),
            size: config.size,
            request_timeout: config.request_timeout,
        })
    }

    fn search_url(&self) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            if let Some(api_key) = &self.api_key {
                query.append_pair("apikey", api_key);
            }
            query.append_pair("keyword", &self.keyword);
            query.append_pair("size", &self.size.to_string());
        }
        url
    }
}

#[async_trait]
impl EventSearch for TicketmasterClient {
    #[instrument(skip(self), fields(keyword = %self.keyword, size = self.size), err)]
    async fn search(&self) -> anyhow::Result<Vec<EventSummary>> {
        let url = self.search_url();
        debug!("Searching events at {}", self.base_url);

        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.context("Event search request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Event search API returned an error status");
            tracing::error!("Url was: {}", self.base_url);
            return Err(anyhow!("Event search API error: {} - {}", status, body));
        }

        let body_text = response.text().await?;

        match serde_json::from_str::<EventsResponse>(&body_text) {
            Ok(parsed) => {
                let events: Vec<EventSummary> = parsed.into_events().into_iter().map(EventSummary::from).collect();
                debug!(count = events.len(), "Event search returned results");
                Ok(events)
            }
            Err(e) => {
                tracing::error!("Failed to parse event search response as JSON. Error: {}", e);
                tracing::debug!("Response body was: {}", body_text);
                Err(anyhow!("error decoding response body: {}", e))
            }
        }
    }
}

/// An [`EventSearch`] that returns a fixed list of events.
pub struct StaticEvents {
    events: Vec<EventSummary>,
}

impl StaticEvents {
    pub fn new(events: Vec<EventSummary>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl EventSearch for StaticEvents {
    async fn search(&self) -> anyhow::Result<Vec<EventSummary>> {
        Ok(self.events.clone())
    }
}
