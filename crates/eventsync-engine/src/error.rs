//! Engine error types.

use eventsync_importers::ImportError;
use eventsync_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that abort one organization's sync cycle.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fetching or converting the feed failed.
    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    /// The store failed outside a single event's upsert.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl EngineError {
    /// Returns true if running the cycle again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Import(err) => err.is_retryable(),
            Self::Store(err) => err.is_retryable(),
            Self::Join(_) => false,
        }
    }
}
