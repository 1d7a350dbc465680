//! Error types for event storage.

use thiserror::Error;

/// Errors raised by an [`crate::EventStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The SQLite driver failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted row holds a value the model cannot represent.
    #[error("invalid persisted event data: {0}")]
    InvalidData(String),

    /// The row was created, changed or removed by another writer between
    /// read and write. Re-reading and re-applying may succeed.
    #[error("concurrent write to {identity} in organization `{organization}`")]
    Conflict {
        organization: String,
        identity: String,
    },

    /// No row exists for the identity.
    #[error("event {identity} not found in organization `{organization}`")]
    NotFound {
        organization: String,
        identity: String,
    },

    /// The database was written by a newer binary.
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },
}

impl StoreError {
    pub(crate) fn conflict(organization: &str, identity: impl ToString) -> Self {
        Self::Conflict {
            organization: organization.to_string(),
            identity: identity.to_string(),
        }
    }

    pub(crate) fn not_found(organization: &str, identity: impl ToString) -> Self {
        Self::NotFound {
            organization: organization.to_string(),
            identity: identity.to_string(),
        }
    }

    /// Returns true if the same operation may succeed after re-reading.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// A specialized Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use eventsync_core::EventIdentity;

    #[test]
    fn only_conflicts_are_retryable() {
        let identity = EventIdentity::new("ride-1", Some("20250301T100000"));
        let conflict = StoreError::conflict("Bike Dallas", &identity);
        assert!(conflict.is_retryable());
        assert_eq!(
            conflict.to_string(),
            "concurrent write to ride-1:20250301T100000 in organization `Bike Dallas`"
        );

        assert!(!StoreError::not_found("Bike Dallas", &identity).is_retryable());
        assert!(!StoreError::InvalidData("bad".into()).is_retryable());
    }
}
