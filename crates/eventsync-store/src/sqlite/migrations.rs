//! Schema migrations, tracked through `PRAGMA user_version`.
//!
//! Versions are strictly increasing and every pending migration is applied
//! in one transaction.

use rusqlite::Connection;
use tracing::info;

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: "CREATE TABLE events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            organization TEXT NOT NULL,
            uid TEXT NOT NULL,
            recurrence_id TEXT NOT NULL DEFAULT '',
            summary TEXT,
            description TEXT,
            location TEXT,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            created TEXT,
            modified TEXT,
            status TEXT,
            transparency TEXT,
            sequence INTEGER NOT NULL DEFAULT 0 CHECK (sequence >= 0),
            rrule TEXT,
            rdate TEXT,
            exdate TEXT,
            rejected INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            UNIQUE (organization, uid, recurrence_id)
        );
        CREATE INDEX idx_events_org_start ON events (organization, start_time);",
    },
    Migration {
        version: 2,
        sql: "ALTER TABLE events ADD COLUMN type TEXT;
        ALTER TABLE events ADD COLUMN overlay TEXT NOT NULL DEFAULT '{}';
        ALTER TABLE events ADD COLUMN exdate_manual TEXT;
        CREATE INDEX idx_events_rejected ON events (rejected, start_time);",
    },
];

/// Returns the latest schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies every pending migration.
///
/// # Errors
///
/// [`StoreError::UnsupportedSchemaVersion`] if the database is newer than
/// this binary.
pub fn apply_migrations(conn: &mut Connection) -> StoreResult<()> {
    let current = current_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(StoreError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    info!(from = current, to = latest, "Applied schema migrations");
    Ok(())
}

pub(crate) fn current_version(conn: &Connection) -> StoreResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}
