//! `custom_dallas_bicycle_coalition`: a Sanity CMS query result.
//!
//! The document is `{"result": [...]}`; descriptions are Portable Text
//! blocks whose children carry the text spans.

use std::sync::Arc;

use chrono::Duration;
use chrono_tz::Tz;
use eventsync_core::{Event, escape_text, parse_instant};
use serde::Deserialize;
use tracing::{info, warn};

use super::null_as_default;
use crate::error::{ImportError, ImportResult};
use crate::fetch::{FeedFetcher, FetchRequest};
use crate::importer::{BoxFuture, Importer, ImporterOptions, option};

/// Registry name of [`BicycleCoalitionImporter`].
pub const BICYCLE_COALITION_IMPORTER: &str = "custom_dallas_bicycle_coalition";

const DEFAULT_UID_PREFIX: &str = "dbc";

#[derive(Debug, Deserialize)]
struct SanityResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    result: Vec<SanityEvent>,
}

#[derive(Debug, Deserialize)]
struct SanityEvent {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "_createdAt")]
    created_at: Option<String>,
    title: Option<String>,
    excerpt: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    description: Vec<Block>,
    #[serde(default, deserialize_with = "null_as_default")]
    date: EventDate,
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EventDate {
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(default, deserialize_with = "null_as_default")]
    children: Vec<Span>,
}

#[derive(Debug, Deserialize)]
struct Span {
    #[serde(default, deserialize_with = "null_as_default")]
    text: String,
}

/// Imports the Dallas Bicycle Coalition event list.
///
/// Options: `uid_prefix` (default `dbc`).
pub struct BicycleCoalitionImporter {
    fetcher: Arc<dyn FeedFetcher>,
    default_tz: Tz,
}

impl BicycleCoalitionImporter {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, default_tz: Tz) -> Self {
        Self { fetcher, default_tz }
    }

    async fn run(
        &self,
        endpoint: &str,
        organization: &str,
        options: &ImporterOptions,
    ) -> ImportResult<Vec<Event>> {
        if endpoint.trim().is_empty() {
            return Err(ImportError::configuration(format!(
                "organization `{}` has no feed URL",
                organization
            )));
        }
        let prefix = option(options, "uid_prefix").unwrap_or(DEFAULT_UID_PREFIX);

        info!(url = %endpoint, "Fetching Sanity event list");
        let body = self.fetcher.fetch(FetchRequest::new(endpoint)).await?;
        let response: SanityResponse = serde_json::from_slice(&body).map_err(|e| {
            ImportError::invalid_response(format!("failed to parse JSON: {}", e)).with_source(e)
        })?;

        let mut events = Vec::with_capacity(response.result.len());
        for item in response.result {
            match self.convert(item, organization, prefix) {
                Some(event) => events.push(event),
                None => warn!("Skipping Sanity event without an _id"),
            }
        }
        Ok(events)
    }

    fn convert(&self, item: SanityEvent, organization: &str, prefix: &str) -> Option<Event> {
        let id = item.id.filter(|id| !id.trim().is_empty())?;
        let instant = |value: Option<&str>| value.and_then(|v| parse_instant(v, self.default_tz));

        let start = instant(item.date.start_date.as_deref()).unwrap_or_default();
        let end = instant(item.date.end_date.as_deref()).unwrap_or(start + Duration::hours(1));

        Some(Event {
            uid: format!("{}_{}", prefix, id),
            organization: organization.to_string(),
            summary: item.title,
            description: description(item.excerpt.as_deref(), &item.description),
            location: item.location,
            start_time: start,
            end_time: end,
            created: instant(item.created_at.as_deref()),
            ..Event::default()
        })
    }
}

/// Escaped excerpt followed by every block child, each terminated by an
/// escaped newline.
fn description(excerpt: Option<&str>, blocks: &[Block]) -> Option<String> {
    let mut out = String::new();
    if let Some(excerpt) = excerpt.filter(|e| !e.trim().is_empty()) {
        out.push_str(&escape_text(excerpt));
        out.push_str("\\n");
    }
    for span in blocks.iter().flat_map(|block| &block.children) {
        out.push_str(&escape_text(&span.text));
        out.push_str("\\n");
    }
    if out.is_empty() { None } else { Some(out) }
}

impl Importer for BicycleCoalitionImporter {
    fn name(&self) -> &str {
        BICYCLE_COALITION_IMPORTER
    }

    fn import<'a>(
        &'a self,
        endpoint: &'a str,
        organization: &'a str,
        options: &'a ImporterOptions,
    ) -> BoxFuture<'a, ImportResult<Vec<Event>>> {
        Box::pin(async move {
            self.run(endpoint, organization, options)
                .await
                .map_err(|e| e.with_importer(BICYCLE_COALITION_IMPORTER))
        })
    }
}
