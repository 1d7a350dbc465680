//! Merging freshly fetched events into the store.
//!
//! Each event is looked up by identity and then inserted, rewritten or left
//! alone depending on its sequence:
//!
//! | incoming vs stored | write | `rejected` afterwards |
//! |---|---|---|
//! | no stored row | insert | `false` |
//! | lower | none | unchanged |
//! | equal, nothing changed | none | unchanged |
//! | equal, changed | update | `false` if the change is significant, else unchanged |
//! | higher | update | `false` |
//!
//! Events of one organization are processed in order, one at a time.

use std::sync::Arc;

use eventsync_core::{Event, EventIdentity};
use eventsync_store::{EventStore, EventUpdate, StoreResult};
use serde::Serialize;
use tracing::{debug, warn};

/// What happened to one incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting; a new row was written.
    Inserted,
    /// The stored row was rewritten.
    Updated {
        /// The row was rejected before and is pending review again.
        rejection_reset: bool,
    },
    /// Same sequence and same content; nothing was written.
    Unchanged,
    /// Lower sequence than stored; nothing was written.
    Stale,
    /// The event has no UID and cannot be keyed.
    Skipped,
}

/// An event whose upsert failed.
#[derive(Debug, Clone, Serialize)]
pub struct EventFailure {
    pub identity: EventIdentity,
    pub error: String,
    /// A concurrent writer got there first; the next cycle will retry.
    pub retryable: bool,
}

/// Per-organization reconciliation counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub stale: usize,
    pub rejection_resets: usize,
    pub skipped: usize,
    pub failures: Vec<EventFailure>,
}

impl SyncReport {
    /// Number of rows written.
    pub fn writes(&self) -> usize {
        self.inserted + self.updated
    }

    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated { rejection_reset } => {
                self.updated += 1;
                if rejection_reset {
                    self.rejection_resets += 1;
                }
            }
            UpsertOutcome::Unchanged => self.unchanged += 1,
            UpsertOutcome::Stale => self.stale += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Applies the sequence and significant-change rules against a store.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn EventStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Upserts every event of `organization` in order. Per-event failures
    /// are collected; they never stop the remaining events.
    pub fn sync(&self, organization: &str, events: &[Event]) -> SyncReport {
        let mut report = SyncReport::default();

        for event in events {
            match self.upsert(organization, event) {
                Ok(outcome) => {
                    debug!(identity = %event.identity(), ?outcome, "Reconciled event");
                    report.record(outcome);
                }
                Err(err) => {
                    warn!(identity = %event.identity(), error = %err, "Failed to reconcile event");
                    report.failures.push(EventFailure {
                        identity: event.identity(),
                        retryable: err.is_retryable(),
                        error: err.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Reconciles one event.
    ///
    /// # Errors
    ///
    /// [`eventsync_store::StoreError::Conflict`] when another writer changed the row between
    /// the read and the write; other store errors as they come.
    pub fn upsert(&self, organization: &str, incoming: &Event) -> StoreResult<UpsertOutcome> {
        if incoming.uid.trim().is_empty() {
            return Ok(UpsertOutcome::Skipped);
        }
        let identity = incoming.identity();

        let Some(existing) = self.store.get_by_identity(organization, &identity)? else {
            let mut record = incoming.as_new_record();
            record.organization = organization.to_string();
            self.store.insert(&record)?;
            return Ok(UpsertOutcome::Inserted);
        };

        if incoming.sequence < existing.sequence {
            return Ok(UpsertOutcome::Stale);
        }
        let rejected = if incoming.sequence > existing.sequence
            || existing.has_significant_change(incoming)
        {
            false
        } else if existing.same_source_content(incoming) {
            return Ok(UpsertOutcome::Unchanged);
        } else {
            existing.rejected
        };

        self.store.update(
            organization,
            &identity,
            &EventUpdate {
                expected_sequence: existing.sequence,
                expected_rejected: existing.rejected,
                source: incoming,
                rejected,
            },
        )?;

        Ok(UpsertOutcome::Updated {
            rejection_reset: existing.rejected && !rejected,
        })
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}
