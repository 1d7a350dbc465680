//! The storage contract used by the sync engine and the moderation commands.

use chrono::{DateTime, Utc};
use eventsync_core::{Event, EventIdentity, Overlay};

use crate::error::StoreResult;

/// A source-driven rewrite of one persisted event.
///
/// The write only lands if the row still carries `expected_sequence` and
/// `expected_rejected`, the values read before the reconciliation decision.
#[derive(Debug, Clone, Copy)]
pub struct EventUpdate<'a> {
    /// Sequence observed when the row was read.
    pub expected_sequence: u32,
    /// Moderation flag observed when the row was read.
    pub expected_rejected: bool,
    /// Source-owned fields to write (sequence included).
    pub source: &'a Event,
    /// The moderation flag to store.
    pub rejected: bool,
}

/// Selects events for listing.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub organization: Option<String>,
    pub rejected: Option<bool>,
    pub event_type: Option<String>,
    /// Only events ending at or after this instant.
    pub ends_after: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Returns true if `event` passes every set criterion. `limit` is not
    /// considered.
    pub fn matches(&self, event: &Event) -> bool {
        self.organization
            .as_ref()
            .is_none_or(|org| &event.organization == org)
            && self.rejected.is_none_or(|rejected| event.rejected == rejected)
            && self
                .event_type
                .as_ref()
                .is_none_or(|kind| event.event_type.as_ref() == Some(kind))
            && self.ends_after.is_none_or(|instant| event.end_time >= instant)
    }
}

/// Changes to locally-owned fields made by a moderator.
///
/// `None` leaves a field alone; for the nullable fields `Some(None)` clears
/// it.
#[derive(Debug, Clone, Default)]
pub struct ModerationPatch {
    pub rejected: Option<bool>,
    pub event_type: Option<Option<String>>,
    pub exdate_manual: Option<Option<String>>,
    pub overlay: Option<Overlay>,
}

impl ModerationPatch {
    /// A patch that marks the event rejected.
    pub fn reject() -> Self {
        Self {
            rejected: Some(true),
            ..Self::default()
        }
    }

    /// A patch that marks the event approved.
    pub fn approve() -> Self {
        Self {
            rejected: Some(false),
            ..Self::default()
        }
    }

    /// A patch that sets the event type.
    pub fn set_type(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(Some(event_type.into())),
            ..Self::default()
        }
    }

    /// Applies the patch to `event`.
    pub fn apply(&self, event: &mut Event) {
        if let Some(rejected) = self.rejected {
            event.rejected = rejected;
        }
        if let Some(ref event_type) = self.event_type {
            event.event_type = event_type.clone();
        }
        if let Some(ref exdate_manual) = self.exdate_manual {
            event.exdate_manual = exdate_manual.clone();
        }
        if let Some(ref overlay) = self.overlay {
            event.overlay = overlay.clone();
        }
    }
}

/// Persistent event storage.
///
/// Rows are keyed by organization plus [`EventIdentity`]; an absent and an
/// empty recurrence ID address the same row. Implementations are
/// synchronous; async callers run them on the blocking pool.
pub trait EventStore: Send + Sync {
    /// Reads the row for `identity` in `organization`.
    fn get_by_identity(
        &self,
        organization: &str,
        identity: &EventIdentity,
    ) -> StoreResult<Option<Event>>;

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// [`crate::StoreError::Conflict`] if the identity already exists.
    fn insert(&self, event: &Event) -> StoreResult<()>;

    /// Rewrites the source-owned columns and the moderation flag.
    ///
    /// # Errors
    ///
    /// [`crate::StoreError::Conflict`] if the row no longer matches the
    /// expected sequence and moderation flag, or is gone.
    fn update(
        &self,
        organization: &str,
        identity: &EventIdentity,
        update: &EventUpdate<'_>,
    ) -> StoreResult<()>;

    /// Every row of `organization`, by start time.
    fn list_by_organization(&self, organization: &str) -> StoreResult<Vec<Event>>;

    /// Deletes one row. Returns false if there was nothing to delete.
    fn delete_by_identity(
        &self,
        uid: &str,
        organization: &str,
        recurrence_id: Option<&str>,
    ) -> StoreResult<bool>;

    /// Rows matching `filter`, by start time.
    fn list(&self, filter: &EventFilter) -> StoreResult<Vec<Event>>;

    /// Applies a moderation patch and returns the updated row.
    ///
    /// # Errors
    ///
    /// [`crate::StoreError::NotFound`] if no row exists.
    fn moderate(
        &self,
        organization: &str,
        identity: &EventIdentity,
        patch: &ModerationPatch,
    ) -> StoreResult<Event>;
}
