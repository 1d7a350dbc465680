//! Event persistence for eventsync.
//!
//! [`EventStore`] is the storage contract the sync engine and the moderation
//! commands program against. Two implementations ship here:
//!
//! - [`MemoryEventStore`]: a mutex-guarded map, for tests and dry runs
//! - [`SqliteEventStore`]: bundled SQLite with versioned migrations

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;
pub use store::{EventFilter, EventStore, EventUpdate, ModerationPatch};
