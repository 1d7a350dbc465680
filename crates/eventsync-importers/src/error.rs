//! Error types for importer operations.
//!
//! An [`ImportError`] aborts one organization's sync cycle. It never aborts
//! the whole run; the driver reports it and moves on to the next
//! organization.

use std::fmt;
use thiserror::Error;

/// The category of an import error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportErrorCode {
    /// Transport failure: connection refused, DNS, TLS, timeout.
    Network,
    /// The server answered with a non-success status.
    HttpStatus,
    /// The body could not be decoded (bad JSON, unexpected envelope).
    InvalidResponse,
    /// The organization's importer options are missing or invalid.
    Configuration,
    /// No importer is registered under the requested name.
    UnknownImporter,
}

impl ImportErrorCode {
    /// Returns a stable machine-readable name for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network_error",
            Self::HttpStatus => "http_status",
            Self::InvalidResponse => "invalid_response",
            Self::Configuration => "configuration_error",
            Self::UnknownImporter => "unknown_importer",
        }
    }
}

impl fmt::Display for ImportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised while fetching or converting one organization's feed.
#[derive(Debug, Error)]
pub struct ImportError {
    code: ImportErrorCode,
    message: String,
    /// HTTP status, for [`ImportErrorCode::HttpStatus`].
    status: Option<u16>,
    /// The importer that raised the error (e.g. "ical").
    importer: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ImportError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ImportErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            importer: None,
            source: None,
        }
    }

    /// Creates a transport error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ImportErrorCode::Network, message)
    }

    /// Creates an error for a non-success HTTP status.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(ImportErrorCode::HttpStatus, message);
        err.status = Some(status);
        err
    }

    /// Creates an undecodable-response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ImportErrorCode::InvalidResponse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ImportErrorCode::Configuration, message)
    }

    /// Creates an unknown-importer error.
    pub fn unknown_importer(name: &str) -> Self {
        Self::new(
            ImportErrorCode::UnknownImporter,
            format!("no importer registered as `{}`", name),
        )
    }

    /// Sets the importer name for this error.
    pub fn with_importer(mut self, importer: impl Into<String>) -> Self {
        self.importer = Some(importer.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ImportErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the error came from one.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the importer name, if set.
    pub fn importer(&self) -> Option<&str> {
        self.importer.as_deref()
    }

    /// Returns true if running the same import later may succeed.
    ///
    /// Nothing in this crate retries; the flag is surfaced to operators.
    pub fn is_retryable(&self) -> bool {
        match self.code {
            ImportErrorCode::Network => true,
            ImportErrorCode::HttpStatus => {
                matches!(self.status, Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref importer) = self.importer {
            write!(f, "[{}] ", importer)?;
        }
        write!(f, "{}", self.code)?;
        if let Some(status) = self.status {
            write!(f, " {}", status)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A specialized Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_codes() {
        assert!(ImportError::network("reset").is_retryable());
        assert!(ImportError::http_status(503, "unavailable").is_retryable());
        assert!(ImportError::http_status(429, "slow down").is_retryable());
        assert!(!ImportError::http_status(404, "gone").is_retryable());
        assert!(!ImportError::configuration("no api_key").is_retryable());
        assert!(!ImportError::invalid_response("bad json").is_retryable());
    }

    #[test]
    fn display_includes_importer_and_status() {
        let err = ImportError::http_status(502, "bad gateway").with_importer("ical");
        assert_eq!(err.to_string(), "[ical] http_status 502: bad gateway");
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.importer(), Some("ical"));
    }

    #[test]
    fn unknown_importer_message() {
        let err = ImportError::unknown_importer("webcal");
        assert_eq!(err.code(), ImportErrorCode::UnknownImporter);
        assert!(err.message().contains("webcal"));
    }

    #[test]
    fn with_source_is_exposed() {
        use std::error::Error;
        let io_err = std::io::Error::other("socket closed");
        let err = ImportError::network("read failed").with_source(io_err);
        assert!(err.source().is_some());
    }
}
