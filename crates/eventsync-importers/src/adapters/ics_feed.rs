//! `ical`: a plain iCalendar feed over HTTP.

use std::sync::Arc;

use chrono_tz::Tz;
use eventsync_core::Event;
use tracing::info;

use crate::error::{ImportError, ImportResult};
use crate::fetch::{FeedFetcher, FetchRequest};
use crate::ics::IcsDecoder;
use crate::importer::{BoxFuture, Importer, ImporterOptions};

/// Registry name of [`IcsFeedImporter`].
pub const ICS_IMPORTER: &str = "ical";

/// Fetches an ICS document and decodes its VEVENTs.
pub struct IcsFeedImporter {
    fetcher: Arc<dyn FeedFetcher>,
    default_tz: Tz,
}

impl IcsFeedImporter {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, default_tz: Tz) -> Self {
        Self { fetcher, default_tz }
    }

    async fn run(&self, endpoint: &str, organization: &str) -> ImportResult<Vec<Event>> {
        if endpoint.trim().is_empty() {
            return Err(ImportError::configuration(format!(
                "organization `{}` has no feed URL",
                organization
            )));
        }

        info!(url = %endpoint, "Fetching ICS feed");
        let body = self.fetcher.fetch(FetchRequest::new(endpoint)).await?;
        let content = String::from_utf8_lossy(&body);
        let content = content.trim_start_matches('\u{feff}');

        Ok(IcsDecoder::new(content, organization, self.default_tz).collect())
    }
}

impl Importer for IcsFeedImporter {
    fn name(&self) -> &str {
        ICS_IMPORTER
    }

    fn import<'a>(
        &'a self,
        endpoint: &'a str,
        organization: &'a str,
        _options: &'a ImporterOptions,
    ) -> BoxFuture<'a, ImportResult<Vec<Event>>> {
        Box::pin(async move {
            self.run(endpoint, organization)
                .await
                .map_err(|e| e.with_importer(ICS_IMPORTER))
        })
    }
}
