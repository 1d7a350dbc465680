//! Removal of stored events that vanished from their source feed.

use std::collections::HashSet;
use std::sync::Arc;

use eventsync_core::{Event, EventIdentity};
use eventsync_store::{EventStore, StoreResult};
use serde::Serialize;
use tracing::{debug, warn};

/// A stored row that could not be deleted.
#[derive(Debug, Clone, Serialize)]
pub struct PruneFailure {
    pub identity: EventIdentity,
    pub error: String,
}

/// Result of pruning one organization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub deleted: Vec<EventIdentity>,
    pub failures: Vec<PruneFailure>,
}

impl PruneReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }
}

/// Deletes an organization's rows whose identity is missing from a fetch.
#[derive(Clone)]
pub struct Pruner {
    store: Arc<dyn EventStore>,
}

impl Pruner {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Deletes every row of `organization` absent from `fetched`.
    ///
    /// An empty `fetched` slice deletes all of the organization's rows.
    /// Per-row delete failures are collected and do not stop the others.
    ///
    /// # Errors
    ///
    /// Fails only when the organization's rows cannot be listed.
    pub fn prune(&self, organization: &str, fetched: &[Event]) -> StoreResult<PruneReport> {
        let stored = self.store.list_by_organization(organization)?;
        let keep: HashSet<EventIdentity> = fetched.iter().map(Event::identity).collect();

        let mut report = PruneReport::default();
        for row in stored {
            let identity = row.identity();
            if keep.contains(&identity) {
                continue;
            }

            match self
                .store
                .delete_by_identity(&identity.uid, organization, identity.recurrence_id())
            {
                Ok(true) => {
                    debug!(%identity, "Pruned event");
                    report.deleted.push(identity);
                }
                Ok(false) => debug!(%identity, "Event already gone"),
                Err(err) => {
                    warn!(%identity, error = %err, "Failed to prune event");
                    report.failures.push(PruneFailure {
                        identity,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}

impl std::fmt::Debug for Pruner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pruner").finish_non_exhaustive()
    }
}
