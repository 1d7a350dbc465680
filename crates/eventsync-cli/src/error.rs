//! CLI error types.

use std::fmt;

use eventsync_importers::ImportError;
use eventsync_store::StoreError;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that end a command with a non-zero exit.
#[derive(Debug)]
pub enum CliError {
    /// The configuration could not be read or is invalid.
    Config(String),
    /// A `pass::` or `env::` reference could not be resolved.
    Secret(String),
    /// Opening or querying the event store failed.
    Store(StoreError),
    /// Building the HTTP client failed.
    Import(ImportError),
    /// Logging could not be initialized.
    Tracing(String),
    /// A command argument was rejected.
    Usage(String),
    /// The sync run finished but some organizations failed.
    SyncFailed(String),
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Secret(msg) => write!(f, "secret error: {}", msg),
            Self::Store(err) => write!(f, "store error: {}", err),
            Self::Import(err) => write!(f, "importer error: {}", err),
            Self::Tracing(msg) => write!(f, "logging setup failed: {}", msg),
            Self::Usage(msg) => write!(f, "{}", msg),
            Self::SyncFailed(msg) => write!(f, "sync failed for {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Import(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<ImportError> for CliError {
    fn from(err: ImportError) -> Self {
        Self::Import(err)
    }
}

impl From<eventsync_core::TracingError> for CliError {
    fn from(err: eventsync_core::TracingError) -> Self {
        Self::Tracing(err.to_string())
    }
}
