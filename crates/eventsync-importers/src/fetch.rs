//! Feed fetching.
//!
//! One GET per call, no retries. [`HttpFetcher`] talks to the network;
//! [`StaticFetcher`] serves canned bodies for tests and offline runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::{debug, trace, warn};

use crate::error::{ImportError, ImportResult};
use crate::importer::BoxFuture;

/// Default request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser-like user agent; some calendar hosts refuse unknown clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const DEFAULT_ACCEPT: &str = "text/calendar,text/plain,*/*";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// A single GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URL to fetch.
    pub url: String,
    /// Extra headers. An extra `Accept` or `Accept-Language` replaces the
    /// default one.
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    /// Creates a request for `url` with no extra headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Adds an extra header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns true if an extra header named `name` is set (case-insensitive).
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}

/// Performs feed downloads.
pub trait FeedFetcher: Send + Sync {
    /// Fetches the request's URL and returns the raw body.
    ///
    /// # Errors
    ///
    /// `Network` for transport failures, `HttpStatus` for non-2xx answers.
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, ImportResult<Vec<u8>>>;
}

/// [`FeedFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the default timeout.
    pub fn new() -> ImportResult<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> ImportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| {
                ImportError::network(format!("failed to create HTTP client: {}", e)).with_source(e)
            })?;
        Ok(Self { client })
    }

    async fn get(&self, request: FetchRequest) -> ImportResult<Vec<u8>> {
        let mut builder = self.client.get(&request.url);
        if !request.has_header("Accept") {
            builder = builder.header("Accept", DEFAULT_ACCEPT);
        }
        if !request.has_header("Accept-Language") {
            builder = builder.header("Accept-Language", DEFAULT_ACCEPT_LANGUAGE);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        trace!(url = %request.url, "Sending request");

        let response = builder.send().await.map_err(|e| {
            ImportError::network(format!("request to {} failed: {}", request.url, e))
                .with_source(e)
        })?;

        handle_response(&request.url, response).await
    }
}

impl FeedFetcher for HttpFetcher {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, ImportResult<Vec<u8>>> {
        Box::pin(self.get(request))
    }
}

async fn handle_response(url: &str, response: Response) -> ImportResult<Vec<u8>> {
    let status = response.status();
    trace!(status = %status, "Received response");

    if status.is_success() {
        let body = response.bytes().await.map_err(|e| {
            ImportError::network(format!("failed to read response from {}: {}", url, e))
                .with_source(e)
        })?;
        debug!(url = %url, bytes = body.len(), "Fetched feed");
        return Ok(body.to_vec());
    }

    let message = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("access to {} denied, check the API key", url)
        }
        StatusCode::NOT_FOUND => format!("{} not found", url),
        StatusCode::TOO_MANY_REQUESTS => format!("rate limited by {}", url),
        s => {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %s, url = %url, body = %body, "Unexpected response status");
            format!("unexpected status from {}", url)
        }
    };

    Err(ImportError::http_status(status.as_u16(), message))
}

/// A canned answer served by [`StaticFetcher`].
#[derive(Debug, Clone)]
pub enum StaticResponse {
    /// 200 with this body.
    Body(Vec<u8>),
    /// A non-success HTTP status.
    Status(u16),
    /// A transport failure with this message.
    NetworkError(String),
}

/// In-memory [`FeedFetcher`] keyed by URL that records every request.
///
/// Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: Mutex<HashMap<String, StaticResponse>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl StaticFetcher {
    /// Creates an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for `url`.
    pub fn with_body(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.set(url, StaticResponse::Body(body.into()));
        self
    }

    /// Answers `url` with a non-success status.
    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.set(url, StaticResponse::Status(status));
        self
    }

    /// Replaces the answer for `url`.
    pub fn set(&self, url: impl Into<String>, response: StaticResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.into(), response);
    }

    /// Returns every request served so far, oldest first.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn answer(&self, request: FetchRequest) -> ImportResult<Vec<u8>> {
        let response = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&request.url)
            .cloned();
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        match response {
            Some(StaticResponse::Body(body)) => Ok(body),
            Some(StaticResponse::Status(status)) => Err(ImportError::http_status(
                status,
                format!("unexpected status from {}", url),
            )),
            Some(StaticResponse::NetworkError(message)) => Err(ImportError::network(message)),
            None => Err(ImportError::http_status(404, format!("{} not found", url))),
        }
    }
}

impl FeedFetcher for StaticFetcher {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, ImportResult<Vec<u8>>> {
        let result = self.answer(request);
        Box::pin(async move { result })
    }
}
