//! In-memory [`EventStore`].

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use eventsync_core::{Event, EventIdentity};

use crate::error::{StoreError, StoreResult};
use crate::store::{EventFilter, EventStore, EventUpdate, ModerationPatch};

/// (organization, uid, recurrence id or "")
type RowKey = (String, String, String);

fn row_key(organization: &str, identity: &EventIdentity) -> RowKey {
    (
        organization.to_string(),
        identity.uid.clone(),
        identity.recurrence_id.clone(),
    )
}

/// Mutex-guarded ordered map. Counts successful writes so tests can assert
/// that a sync pass was a no-op.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    rows: Mutex<BTreeMap<RowKey, Event>>,
    writes: AtomicU64,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of inserts, updates, deletes and moderation writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored rows across all organizations.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<RowKey, Event>> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn sorted(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.uid.cmp(&b.uid))
    });
    events
}

impl EventStore for MemoryEventStore {
    fn get_by_identity(
        &self,
        organization: &str,
        identity: &EventIdentity,
    ) -> StoreResult<Option<Event>> {
        Ok(self.lock().get(&row_key(organization, identity)).cloned())
    }

    fn insert(&self, event: &Event) -> StoreResult<()> {
        let identity = event.identity();
        let key = row_key(&event.organization, &identity);
        let mut rows = self.lock();
        if rows.contains_key(&key) {
            return Err(StoreError::conflict(&event.organization, &identity));
        }
        let mut stored = event.clone();
        stored.recurrence_id = event.normalized_recurrence_id().map(str::to_string);
        rows.insert(key, stored);
        self.wrote();
        Ok(())
    }

    fn update(
        &self,
        organization: &str,
        identity: &EventIdentity,
        update: &EventUpdate<'_>,
    ) -> StoreResult<()> {
        let mut rows = self.lock();
        let row = rows
            .get_mut(&row_key(organization, identity))
            .filter(|row| {
                row.sequence == update.expected_sequence && row.rejected == update.expected_rejected
            })
            .ok_or_else(|| StoreError::conflict(organization, identity))?;
        row.apply_source(update.source);
        row.rejected = update.rejected;
        self.wrote();
        Ok(())
    }

    fn list_by_organization(&self, organization: &str) -> StoreResult<Vec<Event>> {
        let events = self
            .lock()
            .values()
            .filter(|event| event.organization == organization)
            .cloned()
            .collect();
        Ok(sorted(events))
    }

    fn delete_by_identity(
        &self,
        uid: &str,
        organization: &str,
        recurrence_id: Option<&str>,
    ) -> StoreResult<bool> {
        let key = row_key(organization, &EventIdentity::new(uid, recurrence_id));
        let removed = self.lock().remove(&key).is_some();
        if removed {
            self.wrote();
        }
        Ok(removed)
    }

    fn list(&self, filter: &EventFilter) -> StoreResult<Vec<Event>> {
        let events = self
            .lock()
            .values()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();
        let mut events = sorted(events);
        if let Some(limit) = filter.limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    fn moderate(
        &self,
        organization: &str,
        identity: &EventIdentity,
        patch: &ModerationPatch,
    ) -> StoreResult<Event> {
        let mut rows = self.lock();
        let row = rows
            .get_mut(&row_key(organization, identity))
            .ok_or_else(|| StoreError::not_found(organization, identity))?;
        patch.apply(row);
        self.wrote();
        Ok(row.clone())
    }
}
