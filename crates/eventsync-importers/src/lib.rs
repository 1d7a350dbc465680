//! Feed ingestion for eventsync.
//!
//! This crate turns external calendar sources into normalized
//! [`eventsync_core::Event`]s:
//!
//! - [`fetch`]: one-shot HTTP GETs ([`HttpFetcher`]) and an in-memory
//!   stand-in ([`StaticFetcher`])
//! - [`ics`]: line unfolding, VEVENT scoping and property mapping
//! - [`adapters`]: the `ical`, `action_network_api` and
//!   `custom_dallas_bicycle_coalition` importers
//! - [`registry`]: name-to-importer dispatch
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use eventsync_importers::{HttpFetcher, ImporterOptions, ImporterRegistry};
//!
//! let fetcher = Arc::new(HttpFetcher::new()?);
//! let registry = ImporterRegistry::with_defaults(fetcher, eventsync_core::DEFAULT_TIMEZONE);
//! let events = registry
//!     .import("ical", "https://example.org/rides.ics", "Bike Dallas", &ImporterOptions::new())
//!     .await?;
//! ```

pub mod adapters;
pub mod error;
pub mod fetch;
pub mod ics;
pub mod importer;
pub mod registry;

pub use error::{ImportError, ImportErrorCode, ImportResult};
pub use fetch::{FeedFetcher, FetchRequest, HttpFetcher, StaticFetcher, StaticResponse};
pub use importer::{BoxFuture, Importer, ImporterOptions};
pub use registry::ImporterRegistry;
