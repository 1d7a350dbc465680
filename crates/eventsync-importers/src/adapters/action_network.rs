//! `action_network_api`: the Action Network OSDI events API.
//!
//! Responses are HAL envelopes; events sit under `_embedded["osdi:events"]`
//! and the next page, when there is one, under `_links.next.href`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use eventsync_core::{Event, escape_text, parse_instant, reinterpret_wall_clock};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::null_as_default;
use crate::error::{ImportError, ImportResult};
use crate::fetch::{FeedFetcher, FetchRequest};
use crate::importer::{BoxFuture, Importer, ImporterOptions, option};

/// Registry name of [`ActionNetworkImporter`].
pub const ACTION_NETWORK_IMPORTER: &str = "action_network_api";

/// Endpoint used when the organization does not configure one.
pub const DEFAULT_ENDPOINT: &str = "https://actionnetwork.org/api/v2/events";

/// Upper bound on pages fetched per import.
pub const MAX_PAGES: usize = 200;

const DEFAULT_IDENTIFIER_PREFIX: &str = "action_network";

#[derive(Debug, Default, Deserialize)]
struct Page {
    #[serde(default, rename = "_embedded", deserialize_with = "null_as_default")]
    embedded: Embedded,
    #[serde(default, rename = "_links", deserialize_with = "null_as_default")]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Embedded {
    #[serde(default, rename = "osdi:events", deserialize_with = "null_as_default")]
    events: Vec<ActionNetworkEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    next: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ActionNetworkEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    identifiers: Vec<Option<String>>,
    created_date: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    title: Option<String>,
    name: Option<String>,
    status: Option<String>,
    #[serde(default)]
    location: Option<ActionNetworkLocation>,
    browser_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ActionNetworkLocation {
    venue: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    address_lines: Vec<Option<String>>,
    locality: Option<String>,
    region: Option<String>,
    postal_code: Option<String>,
}

impl ActionNetworkLocation {
    /// Venue, address lines, locality, region and postal code, comma
    /// separated, skipping blanks.
    fn display(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .venue
            .iter()
            .chain(self.address_lines.iter().flatten())
            .chain(self.locality.iter())
            .chain(self.region.iter())
            .chain(self.postal_code.iter())
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Imports events from the Action Network API, following pagination.
///
/// Options: `api_key` (required), `identifier_prefix` (default
/// `action_network`).
pub struct ActionNetworkImporter {
    fetcher: Arc<dyn FeedFetcher>,
    default_tz: Tz,
}

impl ActionNetworkImporter {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, default_tz: Tz) -> Self {
        Self { fetcher, default_tz }
    }

    async fn run(
        &self,
        endpoint: &str,
        organization: &str,
        options: &ImporterOptions,
    ) -> ImportResult<Vec<Event>> {
        let api_key = option(options, "api_key").ok_or_else(|| {
            ImportError::configuration(format!(
                "api_key not found in options for organization `{}`",
                organization
            ))
        })?;
        let prefix = option(options, "identifier_prefix").unwrap_or(DEFAULT_IDENTIFIER_PREFIX);
        let endpoint = match endpoint.trim() {
            "" => DEFAULT_ENDPOINT,
            url => url,
        };

        let raw = self.fetch_all(endpoint, api_key).await?;
        let mut events = Vec::with_capacity(raw.len());
        for item in raw {
            match self.convert(item, organization, prefix) {
                Some(event) => events.push(event),
                None => warn!(
                    prefix = %prefix,
                    "Skipping Action Network event without a matching identifier"
                ),
            }
        }
        Ok(events)
    }

    async fn fetch_all(&self, endpoint: &str, api_key: &str) -> ImportResult<Vec<ActionNetworkEvent>> {
        let mut events = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(endpoint.to_string());

        while let Some(url) = next.take() {
            if !seen.insert(url.clone()) {
                warn!(url = %url, "Pagination loops back to a visited page, stopping");
                break;
            }
            if seen.len() > MAX_PAGES {
                warn!(max_pages = MAX_PAGES, "Page limit reached, stopping");
                break;
            }

            info!(url = %url, "Fetching Action Network page");
            let request = FetchRequest::new(url.as_str())
                .with_header("OSDI-API-Token", api_key)
                .with_header("Content-Type", "application/json")
                .with_header("Accept", "application/json");
            let body = self.fetcher.fetch(request).await?;
            let page: Page = serde_json::from_slice(&body).map_err(|e| {
                ImportError::invalid_response(format!("failed to parse page {}: {}", url, e))
                    .with_source(e)
            })?;

            debug!(url = %url, count = page.embedded.events.len(), "Decoded page");
            events.extend(page.embedded.events);

            next = match page.links.next.and_then(|link| link.href) {
                Some(href) if !href.trim().is_empty() => Some(resolve(&url, href.trim())?),
                _ => None,
            };
        }

        Ok(events)
    }

    fn convert(&self, item: ActionNetworkEvent, organization: &str, prefix: &str) -> Option<Event> {
        let uid = item
            .identifiers
            .iter()
            .flatten()
            .find(|id| id.split_once(':').is_some_and(|(p, _)| p == prefix))?
            .clone();

        let start = self.wall_clock(item.start_date.as_deref()).unwrap_or_default();
        let end = self
            .wall_clock(item.end_date.as_deref())
            .unwrap_or(start + Duration::hours(1));
        let created = item
            .created_date
            .as_deref()
            .and_then(|value| parse_instant(value, self.default_tz));

        let summary = non_blank(item.title).or_else(|| non_blank(item.name));
        let description = escape_text(&format!(
            "Register for this event from {} on Action Network: {}",
            organization,
            item.browser_url.as_deref().unwrap_or_default()
        ));

        Some(Event {
            uid,
            organization: organization.to_string(),
            summary,
            description: Some(description),
            location: item.location.as_ref().and_then(ActionNetworkLocation::display),
            start_time: start,
            end_time: end,
            created,
            modified: created,
            status: item.status.map(|s| s.to_uppercase()),
            transparency: Some("OPAQUE".to_string()),
            ..Event::default()
        })
    }

    /// Action Network reports local wall-clock times with a meaningless
    /// offset; keep the reading and place it in the default zone.
    fn wall_clock(&self, value: Option<&str>) -> Option<DateTime<Utc>> {
        let value = value?.trim();
        match DateTime::parse_from_rfc3339(value) {
            Ok(dt) => Some(reinterpret_wall_clock(dt, self.default_tz)),
            Err(_) => parse_instant(value, self.default_tz),
        }
    }
}

impl Importer for ActionNetworkImporter {
    fn name(&self) -> &str {
        ACTION_NETWORK_IMPORTER
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
                .map_err(|e| e.with_importer(ACTION_NETWORK_IMPORTER))
        })
    }
}

fn resolve(current: &str, href: &str) -> ImportResult<String> {
    let base = Url::parse(current).map_err(|e| {
        ImportError::invalid_response(format!("invalid page URL {}: {}", current, e)).with_source(e)
    })?;
    base.join(href).map(String::from).map_err(|e| {
        ImportError::invalid_response(format!("invalid next link {}: {}", href, e)).with_source(e)
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportErrorCode;
    use crate::fetch::StaticFetcher;
    use chrono::TimeZone;
    use eventsync_core::DEFAULT_TIMEZONE;
    use serde_json::json;

    const BASE: &str = "https://actionnetwork.org/api/v2/events";

    fn options() -> ImporterOptions {
        let mut options = ImporterOptions::new();
        options.insert("api_key".into(), "secret-token".into());
        options
    }

    fn event(n: u32) -> serde_json::Value {
        json!({
            "identifiers": [format!("other:{n}"), format!("action_network:{n}")],
            "title": format!("Event {n}"),
            "start_date": "2025-03-01T10:00:00Z",
            "created_date": "2025-02-01T12:00:00Z",
            "status": "confirmed",
            "browser_url": format!("https://actionnetwork.org/events/{n}"),
        })
    }

    fn page(events: Vec<serde_json::Value>, next: Option<&str>) -> Vec<u8> {
        let mut body = json!({ "_embedded": { "osdi:events": events } });
        if let Some(next) = next {
            body["_links"] = json!({ "next": { "href": next } });
        }
        serde_json::to_vec(&body).unwrap()
    }

    fn importer(fetcher: Arc<StaticFetcher>) -> ActionNetworkImporter {
        ActionNetworkImporter::new(fetcher, DEFAULT_TIMEZONE)
    }

    #[tokio::test]
    async fn follows_next_links_in_page_order() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with_body(BASE, page(vec![event(1), event(2)], Some("?page=2")))
                .with_body(
                    format!("{BASE}?page=2"),
                    page(vec![event(3), event(4)], Some(&format!("{BASE}?page=3"))),
                )
                .with_body(format!("{BASE}?page=3"), page(vec![event(5), event(6)], None)),
        );

        let events = importer(fetcher.clone())
            .import("", "Dallas Urbanists", &options())
            .await
            .unwrap();

        let uids: Vec<_> = events.iter().map(|e| e.uid.as_str()).collect();
        assert_eq!(
            uids,
            vec![
                "action_network:1",
                "action_network:2",
                "action_network:3",
                "action_network:4",
                "action_network:5",
                "action_network:6",
            ]
        );

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| {
            r.headers
                .contains(&("OSDI-API-Token".to_string(), "secret-token".to_string()))
        }));
    }

    #[tokio::test]
    async fn maps_fields() {
        let body = page(
            vec![json!({
                "identifiers": ["action_network:abc"],
                "name": "Fallback name",
                "start_date": "2025-03-01T10:00:00Z",
                "end_date": "2025-03-01T12:30:00Z",
                "created_date": "2025-02-01T12:00:00Z",
                "status": "confirmed",
                "browser_url": "https://actionnetwork.org/events/abc",
                "location": {
                    "venue": "City Hall",
                    "address_lines": ["1500 Marilla St", ""],
                    "locality": "Dallas",
                    "region": "TX",
                    "postal_code": "75201"
                }
            })],
            None,
        );
        let fetcher = Arc::new(StaticFetcher::new().with_body(BASE, body));

        let events = importer(fetcher)
            .import(BASE, "Dallas Urbanists", &options())
            .await
            .unwrap();
        let e = &events[0];

        assert_eq!(e.uid, "action_network:abc");
        assert_eq!(e.summary.as_deref(), Some("Fallback name"));
        // 10:00 wall clock in Chicago (CST).
        assert_eq!(e.start_time, Utc.with_ymd_and_hms(2025, 3, 1, 16, 0, 0).unwrap());
        assert_eq!(e.end_time, Utc.with_ymd_and_hms(2025, 3, 1, 18, 30, 0).unwrap());
        assert_eq!(e.created, Some(Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap()));
        assert_eq!(e.modified, e.created);
        assert_eq!(e.status.as_deref(), Some("CONFIRMED"));
        assert_eq!(e.transparency.as_deref(), Some("OPAQUE"));
        assert_eq!(
            e.location.as_deref(),
            Some("City Hall, 1500 Marilla St, Dallas, TX, 75201")
        );
        insta::assert_snapshot!(
            e.description.as_deref().unwrap(),
            @r"Register for this event from Dallas Urbanists on Action Network: https://actionnetwork.org/events/abc"
        );
    }

    #[tokio::test]
    async fn missing_end_is_one_hour_after_start() {
        let fetcher = Arc::new(StaticFetcher::new().with_body(BASE, page(vec![event(1)], None)));
        let events = importer(fetcher).import(BASE, "Org", &options()).await.unwrap();
        assert_eq!(events[0].duration(), Duration::hours(1));
    }

    #[tokio::test]
    async fn events_without_provider_identifier_are_skipped() {
        let body = page(
            vec![json!({ "identifiers": ["other:1"], "title": "Nope" }), event(2)],
            None,
        );
        let fetcher = Arc::new(StaticFetcher::new().with_body(BASE, body));
        let events = importer(fetcher).import(BASE, "Org", &options()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].uid, "action_network:2");
    }

    #[tokio::test]
    async fn null_fields_read_as_empty() {
        let body = page(
            vec![
                json!({
                    "identifiers": ["action_network:nulls"],
                    "title": "Null address",
                    "start_date": "2025-03-01T10:00:00Z",
                    "location": {
                        "venue": "Klyde Warren Park",
                        "address_lines": null,
                        "locality": "Dallas",
                        "region": null
                    }
                }),
                json!({ "identifiers": null, "title": "No ids" }),
                event(2),
            ],
            None,
        );
        let fetcher = Arc::new(StaticFetcher::new().with_body(BASE, body));
        let events = importer(fetcher).import(BASE, "Org", &options()).await.unwrap();

        let uids: Vec<_> = events.iter().map(|e| e.uid.as_str()).collect();
        assert_eq!(uids, vec!["action_network:nulls", "action_network:2"]);
        assert_eq!(events[0].location.as_deref(), Some("Klyde Warren Park, Dallas"));
    }

    #[tokio::test]
    async fn null_envelope_is_an_empty_page() {
        let body = br#"{"_embedded": {"osdi:events": null}, "_links": null}"#.to_vec();
        let fetcher = Arc::new(StaticFetcher::new().with_body(BASE, body));
        let events = importer(fetcher).import(BASE, "Org", &options()).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn custom_identifier_prefix() {
        let mut opts = options();
        opts.insert("identifier_prefix".into(), "other".into());
        let fetcher = Arc::new(StaticFetcher::new().with_body(BASE, page(vec![event(7)], None)));
        let events = importer(fetcher).import(BASE, "Org", &opts).await.unwrap();
        assert_eq!(events[0].uid, "other:7");
    }

    #[tokio::test]
    async fn stops_on_pagination_loop() {
        let fetcher = Arc::new(
            StaticFetcher::new().with_body(BASE, page(vec![event(1)], Some(BASE))),
        );
        let events = importer(fetcher.clone()).import(BASE, "Org", &options()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn requires_api_key() {
        let fetcher = Arc::new(StaticFetcher::new());
        let err = importer(fetcher.clone())
            .import(BASE, "Org", &ImporterOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ImportErrorCode::Configuration);
        assert_eq!(err.importer(), Some(ACTION_NETWORK_IMPORTER));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn malformed_page_is_invalid_response() {
        let fetcher = Arc::new(StaticFetcher::new().with_body(BASE, "<html>oops</html>"));
        let err = importer(fetcher).import(BASE, "Org", &options()).await.unwrap_err();
        assert_eq!(err.code(), ImportErrorCode::InvalidResponse);
    }

    #[tokio::test]
    async fn failing_page_aborts_import() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with_body(BASE, page(vec![event(1)], Some("?page=2")))
                .with_status(format!("{BASE}?page=2"), 500),
        );
        let err = importer(fetcher).import(BASE, "Org", &options()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
