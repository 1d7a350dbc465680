//! Store wrapper that fails selected operations, for unit tests.

use std::collections::HashSet;

use eventsync_core::{Event, EventIdentity};
use eventsync_store::{
    EventFilter, EventStore, EventUpdate, MemoryEventStore, ModerationPatch, StoreError,
    StoreResult,
};

/// Delegates to a [`MemoryEventStore`], except that deletes of
/// `failing_deletes` UIDs fail with `InvalidData` and updates of
/// `conflicting_updates` UIDs fail with `Conflict`.
#[derive(Debug, Default)]
pub(crate) struct FaultyStore {
    pub inner: MemoryEventStore,
    pub failing_deletes: HashSet<String>,
    pub conflicting_updates: HashSet<String>,
}

impl FaultyStore {
    pub fn failing_delete(mut self, uid: &str) -> Self {
        self.failing_deletes.insert(uid.to_string());
        self
    }

    pub fn conflicting_update(mut self, uid: &str) -> Self {
        self.conflicting_updates.insert(uid.to_string());
        self
    }
}

impl EventStore for FaultyStore {
    fn get_by_identity(
        &self,
        organization: &str,
        identity: &EventIdentity,
    ) -> StoreResult<Option<Event>> {
        self.inner.get_by_identity(organization, identity)
    }

    fn insert(&self, event: &Event) -> StoreResult<()> {
        self.inner.insert(event)
    }

    fn update(
        &self,
        organization: &str,
        identity: &EventIdentity,
        update: &EventUpdate<'_>,
    ) -> StoreResult<()> {
        if self.conflicting_updates.contains(&identity.uid) {
            return Err(StoreError::Conflict {
                organization: organization.to_string(),
                identity: identity.to_string(),
            });
        }
        self.inner.update(organization, identity, update)
    }

    fn list_by_organization(&self, organization: &str) -> StoreResult<Vec<Event>> {
        self.inner.list_by_organization(organization)
    }

    fn delete_by_identity(
        &self,
        uid: &str,
        organization: &str,
        recurrence_id: Option<&str>,
    ) -> StoreResult<bool> {
        if self.failing_deletes.contains(uid) {
            return Err(StoreError::InvalidData(format!("cannot delete {}", uid)));
        }
        self.inner.delete_by_identity(uid, organization, recurrence_id)
    }

    fn list(&self, filter: &EventFilter) -> StoreResult<Vec<Event>> {
        self.inner.list(filter)
    }

    fn moderate(
        &self,
        organization: &str,
        identity: &EventIdentity,
        patch: &ModerationPatch,
    ) -> StoreResult<Event> {
        self.inner.moderate(organization, identity, patch)
    }
}
