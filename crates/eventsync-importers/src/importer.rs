//! The importer abstraction.
//!
//! An importer turns one organization's feed endpoint into a list of
//! normalized [`Event`]s. Importers are stateless apart from the fetcher and
//! timezone they were built with, so one instance serves every organization
//! configured to use it.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use eventsync_core::Event;

use crate::error::ImportResult;

/// A boxed future for async trait methods.
///
/// Keeps [`Importer`] and [`crate::FeedFetcher`] object safe so the registry
/// can hold them as trait objects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-organization importer options (e.g. `api_key`), with secret
/// references already resolved.
pub type ImporterOptions = BTreeMap<String, String>;

/// A named source adapter.
///
/// # Example Implementation
///
/// ```ignore
/// struct StaticImporter(Vec<Event>);
///
/// impl Importer for StaticImporter {
///     fn name(&self) -> &str { "static" }
///
///     fn import<'a>(
///         &'a self,
///         _endpoint: &'a str,
///         _organization: &'a str,
///         _options: &'a ImporterOptions,
///     ) -> BoxFuture<'a, ImportResult<Vec<Event>>> {
///         Box::pin(async move { Ok(self.0.clone()) })
///     }
/// }
/// ```
pub trait Importer: Send + Sync {
    /// Returns the registry name of this importer (e.g. "ical").
    fn name(&self) -> &str;

    /// Fetches `endpoint` and converts its content into events owned by
    /// `organization`.
    ///
    /// # Errors
    ///
    /// Returns an [`crate::ImportError`] when the feed cannot be fetched or
    /// its envelope cannot be decoded, or when required options are missing.
    /// Malformed individual fields never fail the import.
    fn import<'a>(
        &'a self,
        endpoint: &'a str,
        organization: &'a str,
        options: &'a ImporterOptions,
    ) -> BoxFuture<'a, ImportResult<Vec<Event>>>;
}

/// Looks up an option, treating blank values as absent.
pub(crate) fn option<'a>(options: &'a ImporterOptions, key: &str) -> Option<&'a str> {
    options
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_options_are_absent() {
        let mut options = ImporterOptions::new();
        options.insert("api_key".into(), "  ".into());
        options.insert("uid_prefix".into(), " dbc ".into());

        assert_eq!(option(&options, "api_key"), None);
        assert_eq!(option(&options, "uid_prefix"), Some("dbc"));
        assert_eq!(option(&options, "missing"), None);
    }
}
