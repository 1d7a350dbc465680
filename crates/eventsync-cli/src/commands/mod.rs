//! Subcommand implementations.

pub mod config;
pub mod daemon;
pub mod events;
pub mod importers;
pub mod sync;

use std::path::Path;
use std::sync::Arc;

use eventsync_importers::{HttpFetcher, ImporterRegistry};
use eventsync_store::SqliteEventStore;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::CliResult;

/// Builds the registry of built-in importers over a real HTTP fetcher.
pub fn build_registry(config: &AppConfig) -> CliResult<ImporterRegistry> {
    let fetcher = HttpFetcher::with_timeout(config.fetch_timeout())?;
    Ok(ImporterRegistry::with_defaults(
        Arc::new(fetcher),
        config.timezone()?,
    ))
}

/// Opens the event database, creating its directory when needed.
pub fn open_store(path: &Path) -> CliResult<Arc<SqliteEventStore>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        debug!(dir = %parent.display(), "Creating database directory");
        std::fs::create_dir_all(parent)?;
    }
    Ok(Arc::new(SqliteEventStore::open(path)?))
}
