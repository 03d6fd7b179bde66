//! Error types for zone reconciliation
//!
//! This module defines all error types used throughout the crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for zonesync
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Credentials were rejected (HTTP 401/403). Never retried.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The provider is throttling requests (HTTP 429)
    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited {
        /// Hint from the `Retry-After` header, if any
        retry_after: Option<Duration>,
    },

    /// Transport failure or HTTP 5xx
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Record type outside the supported enumeration, or a record carrying
    /// dynamic routing data
    #[error("Unsupported record type: {0}")]
    UnsupportedRecordType(String),

    /// The provider refused a mutation (HTTP 4xx other than 401/403/404/409/429)
    #[error("Change rejected by provider (HTTP {status}): {message}")]
    ApplyRejected {
        /// HTTP status code
        status: u16,
        /// Provider response body
        message: String,
    },

    /// Record or zone not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create hit an existing record (HTTP 409)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The zone does not exist and the provider cannot create it
    #[error("Unknown zone: {0}")]
    UnknownZone(String),

    /// A record or value that cannot be normalized
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Apply stopped before this change was attempted
    #[error("Cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}

/// Flat classification of [`Error`] used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Auth,
    RateLimited,
    RemoteUnavailable,
    UnsupportedRecordType,
    ApplyRejected,
    NotFound,
    AlreadyExists,
    UnknownZone,
    InvalidRecord,
    Cancelled,
    Config,
    Json,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Auth => "AuthError",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::RemoteUnavailable => "RemoteUnavailable",
            ErrorKind::UnsupportedRecordType => "UnsupportedRecordType",
            ErrorKind::ApplyRejected => "ApplyRejected",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::UnknownZone => "UnknownZone",
            ErrorKind::InvalidRecord => "InvalidRecord",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Json => "JsonError",
            ErrorKind::Other => "Other",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a remote-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::RemoteUnavailable(msg.into())
    }

    /// Create an unsupported record type error
    pub fn unsupported(record_type: impl Into<String>) -> Self {
        Self::UnsupportedRecordType(record_type.into())
    }

    /// Create an apply-rejected error
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::ApplyRejected {
            status,
            message: message.into(),
        }
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map an HTTP status code to the error taxonomy.
    ///
    /// `retry_after` is only consulted for 429.
    pub fn from_status(status: u16, body: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::Auth(format!("HTTP {status}: {body}")),
            404 => Self::NotFound(body),
            409 => Self::AlreadyExists(body),
            429 => Self::RateLimited { retry_after },
            500..=599 => Self::RemoteUnavailable(format!("HTTP {status}: {body}")),
            _ => Self::ApplyRejected {
                status,
                message: body,
            },
        }
    }

    /// Classification used in reports
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Auth(_) => ErrorKind::Auth,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            Error::UnsupportedRecordType(_) => ErrorKind::UnsupportedRecordType,
            Error::ApplyRejected { .. } => ErrorKind::ApplyRejected,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::UnknownZone(_) => ErrorKind::UnknownZone,
            Error::InvalidRecord(_) => ErrorKind::InvalidRecord,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Config(_) => ErrorKind::Config,
            Error::Json(_) => ErrorKind::Json,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether a retry of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RemoteUnavailable(_) | Error::RateLimited { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
