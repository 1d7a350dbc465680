//! `eventsync importers`: list the registered importer names.

use eventsync_importers::ImporterRegistry;

use crate::error::CliResult;

pub fn list(registry: &ImporterRegistry) -> CliResult<()> {
    for name in registry.names() {
        println!("{}", name);
    }
    Ok(())
}
