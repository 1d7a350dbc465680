//! The importer registry.
//!
//! Built once at startup and handed to the sync driver; there is no global
//! lookup table.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono_tz::Tz;
use eventsync_core::Event;

use crate::adapters::{ActionNetworkImporter, BicycleCoalitionImporter, IcsFeedImporter};
use crate::error::{ImportError, ImportResult};
use crate::fetch::FeedFetcher;
use crate::importer::{Importer, ImporterOptions};

/// Maps importer names to adapters.
#[derive(Default, Clone)]
pub struct ImporterRegistry {
    importers: BTreeMap<String, Arc<dyn Importer>>,
}

impl ImporterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the three built-in adapters, all sharing
    /// `fetcher` and resolving floating times in `default_tz`.
    pub fn with_defaults(fetcher: Arc<dyn FeedFetcher>, default_tz: Tz) -> Self {
        let mut registry = Self::new();
        registry.register(IcsFeedImporter::new(fetcher.clone(), default_tz));
        registry.register(ActionNetworkImporter::new(fetcher.clone(), default_tz));
        registry.register(BicycleCoalitionImporter::new(fetcher, default_tz));
        registry
    }

    /// Adds or replaces an importer under its own name.
    pub fn register(&mut self, importer: impl Importer + 'static) {
        self.importers
            .insert(importer.name().to_string(), Arc::new(importer));
    }

    /// Returns the importer registered as `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Importer>> {
        self.importers.get(name).cloned()
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.importers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.importers.keys().map(String::as_str).collect()
    }

    /// Dispatches to the importer registered as `importer`.
    pub async fn import(
        &self,
        importer: &str,
        endpoint: &str,
        organization: &str,
        options: &ImporterOptions,
    ) -> ImportResult<Vec<Event>> {
        let adapter = self
            .get(importer)
            .ok_or_else(|| ImportError::unknown_importer(importer))?;
        adapter.import(endpoint, organization, options).await
    }
}

impl std::fmt::Debug for ImporterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImporterRegistry")
            .field("importers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportErrorCode;
    use crate::fetch::StaticFetcher;
    use crate::importer::BoxFuture;
    use chrono::Utc;
    use eventsync_core::DEFAULT_TIMEZONE;

    struct FixedImporter;

    impl Importer for FixedImporter {
        fn name(&self) -> &str {
            "fixed"
        }

        fn import<'a>(
            &'a self,
            endpoint: &'a str,
            organization: &'a str,
            _options: &'a ImporterOptions,
        ) -> BoxFuture<'a, ImportResult<Vec<Event>>> {
            Box::pin(async move {
                Ok(vec![Event::new(endpoint, organization, Utc::now(), Utc::now())])
            })
        }
    }

    #[test]
    fn defaults_are_registered() {
        let registry = ImporterRegistry::with_defaults(Arc::new(StaticFetcher::new()), DEFAULT_TIMEZONE);
        assert_eq!(
            registry.names(),
            vec!["action_network_api", "custom_dallas_bicycle_coalition", "ical"]
        );
        assert!(registry.contains("ical"));
        assert!(!registry.contains("webcal"));
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let mut registry = ImporterRegistry::new();
        registry.register(FixedImporter);

        let events = registry
            .import("fixed", "uid-from-endpoint", "Org", &ImporterOptions::new())
            .await
            .unwrap();
        assert_eq!(events[0].uid, "uid-from-endpoint");
        assert_eq!(events[0].organization, "Org");
    }

    #[tokio::test]
    async fn unknown_importer() {
        let registry = ImporterRegistry::new();
        let err = registry
            .import("webcal", "https://example.org", "Org", &ImporterOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ImportErrorCode::UnknownImporter);
    }
}
