//! SQLite-backed [`EventStore`].
//!
//! One connection behind a mutex. Column lists are spelled out below; the
//! row mapping in [`parse_event_row`] must stay in step with
//! [`EVENT_COLUMNS`].

pub mod migrations;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use eventsync_core::{Event, EventIdentity, Overlay};
use rusqlite::{Connection, ErrorCode, Params, Row, ToSql, params, params_from_iter};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::store::{EventFilter, EventStore, EventUpdate, ModerationPatch};

use migrations::apply_migrations;

const EVENT_COLUMNS: &str = "organization, uid, recurrence_id, summary, description, location, \
    start_time, end_time, created, modified, status, transparency, sequence, \
    rrule, rdate, exdate, rejected, type, overlay, exdate_manual";

const UPDATED_AT_NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// SQLite event store.
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Opens (creating if needed) the database at `path` and migrates it.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let started_at = Instant::now();
        let conn = Connection::open(path)?;
        let store = Self::bootstrap(conn)?;
        info!(
            path = %path.display(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Opened event database"
        );
        Ok(store)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn select<P: Params>(&self, conn: &Connection, clause: &str, params: P) -> StoreResult<Vec<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events {clause}");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params)?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }
}

impl EventStore for SqliteEventStore {
    fn get_by_identity(
        &self,
        organization: &str,
        identity: &EventIdentity,
    ) -> StoreResult<Option<Event>> {
        let conn = self.conn();
        let mut events = self.select(
            &conn,
            "WHERE organization = ?1 AND uid = ?2 AND recurrence_id = ?3",
            params![organization, identity.uid, identity.recurrence_id],
        )?;
        Ok(events.pop())
    }

    fn insert(&self, event: &Event) -> StoreResult<()> {
        let conn = self.conn();
        let overlay = serde_json::to_string(&event.overlay)?;
        let result = conn.execute(
            &format!(
                "INSERT INTO events ({EVENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
            ),
            params![
                event.organization,
                event.uid,
                event.normalized_recurrence_id().unwrap_or_default(),
                event.summary,
                event.description,
                event.location,
                event.start_time,
                event.end_time,
                event.created,
                event.modified,
                event.status,
                event.transparency,
                event.sequence,
                event.rrule,
                event.rdate,
                event.exdate,
                event.rejected,
                event.event_type,
                overlay,
                event.exdate_manual,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::conflict(&event.organization, event.identity()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update(
        &self,
        organization: &str,
        identity: &EventIdentity,
        update: &EventUpdate<'_>,
    ) -> StoreResult<()> {
        let source = update.source;
        let changed = self.conn().execute(
            &format!(
                "UPDATE events SET
                    summary = ?1, description = ?2, location = ?3,
                    start_time = ?4, end_time = ?5, created = ?6, modified = ?7,
                    status = ?8, transparency = ?9, sequence = ?10,
                    rrule = ?11, rdate = ?12, exdate = ?13,
                    rejected = ?14, updated_at = {UPDATED_AT_NOW}
                 WHERE organization = ?15 AND uid = ?16 AND recurrence_id = ?17
                   AND sequence = ?18 AND rejected = ?19"
            ),
            params![
                source.summary,
                source.description,
                source.location,
                source.start_time,
                source.end_time,
                source.created,
                source.modified,
                source.status,
                source.transparency,
                source.sequence,
                source.rrule,
                source.rdate,
                source.exdate,
                update.rejected,
                organization,
                identity.uid,
                identity.recurrence_id,
                update.expected_sequence,
                update.expected_rejected,
            ],
        )?;

        if changed == 0 {
            debug!(organization = %organization, identity = %identity, "Update guard failed");
            return Err(StoreError::conflict(organization, identity));
        }
        Ok(())
    }

    fn list_by_organization(&self, organization: &str) -> StoreResult<Vec<Event>> {
        let conn = self.conn();
        self.select(
            &conn,
            "WHERE organization = ?1 ORDER BY start_time, uid",
            params![organization],
        )
    }

    fn delete_by_identity(
        &self,
        uid: &str,
        organization: &str,
        recurrence_id: Option<&str>,
    ) -> StoreResult<bool> {
        let changed = self.conn().execute(
            "DELETE FROM events WHERE uid = ?1 AND organization = ?2 AND recurrence_id = ?3",
            params![uid, organization, recurrence_id.unwrap_or_default()],
        )?;
        Ok(changed > 0)
    }

    fn list(&self, filter: &EventFilter) -> StoreResult<Vec<Event>> {
        let mut clause = String::from("WHERE 1 = 1");
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref organization) = filter.organization {
            values.push(Box::new(organization.clone()));
            clause.push_str(&format!(" AND organization = ?{}", values.len()));
        }
        if let Some(rejected) = filter.rejected {
            values.push(Box::new(rejected));
            clause.push_str(&format!(" AND rejected = ?{}", values.len()));
        }
        if let Some(ref event_type) = filter.event_type {
            values.push(Box::new(event_type.clone()));
            clause.push_str(&format!(" AND type = ?{}", values.len()));
        }
        if let Some(ends_after) = filter.ends_after {
            values.push(Box::new(ends_after));
            clause.push_str(&format!(" AND end_time >= ?{}", values.len()));
        }
        clause.push_str(" ORDER BY start_time, uid");
        if let Some(limit) = filter.limit {
            values.push(Box::new(limit as i64));
            clause.push_str(&format!(" LIMIT ?{}", values.len()));
        }

        let conn = self.conn();
        self.select(&conn, &clause, params_from_iter(values.iter()))
    }

    fn moderate(
        &self,
        organization: &str,
        identity: &EventIdentity,
        patch: &ModerationPatch,
    ) -> StoreResult<Event> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut event = self
            .select(
                &tx,
                "WHERE organization = ?1 AND uid = ?2 AND recurrence_id = ?3",
                params![organization, identity.uid, identity.recurrence_id],
            )?
            .pop()
            .ok_or_else(|| StoreError::not_found(organization, identity))?;
        patch.apply(&mut event);

        tx.execute(
            &format!(
                "UPDATE events SET rejected = ?1, type = ?2, overlay = ?3, exdate_manual = ?4,
                    updated_at = {UPDATED_AT_NOW}
                 WHERE organization = ?5 AND uid = ?6 AND recurrence_id = ?7"
            ),
            params![
                event.rejected,
                event.event_type,
                serde_json::to_string(&event.overlay)?,
                event.exdate_manual,
                organization,
                identity.uid,
                identity.recurrence_id,
            ],
        )?;
        tx.commit()?;

        Ok(event)
    }
}

fn parse_event_row(row: &Row<'_>) -> StoreResult<Event> {
    let recurrence_id: String = row.get("recurrence_id")?;
    let overlay_json: String = row.get("overlay")?;
    let overlay: Overlay = serde_json::from_str(&overlay_json).map_err(|e| {
        StoreError::InvalidData(format!("overlay is not valid JSON ({}): {}", e, overlay_json))
    })?;

    Ok(Event {
        organization: row.get("organization")?,
        uid: row.get("uid")?,
        recurrence_id: Some(recurrence_id).filter(|id| !id.is_empty()),
        summary: row.get("summary")?,
        description: row.get("description")?,
        location: row.get("location")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        created: row.get("created")?,
        modified: row.get("modified")?,
        status: row.get("status")?,
        transparency: row.get("transparency")?,
        sequence: row.get("sequence")?,
        rrule: row.get("rrule")?,
        rdate: row.get("rdate")?,
        exdate: row.get("exdate")?,
        rejected: row.get("rejected")?,
        event_type: row.get("type")?,
        overlay,
        exdate_manual: row.get("exdate_manual")?,
    })
}
