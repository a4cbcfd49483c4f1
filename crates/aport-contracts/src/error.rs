//! Error types for the APort verification client.
//!
//! All fallible client operations return `AportResult<T>`. The variants form a
//! closed taxonomy so callers branch on `ErrorKind`, never on message text.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The unified error type for every APort crate.
#[derive(Debug, Error)]
pub enum AportError {
    /// A local precondition failed before any request was built.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// No HTTP response was received (DNS, connect, timeout).
    #[error("network failure: {reason}")]
    NetworkFailure { reason: String },

    /// The service answered with a 4xx status not covered by a narrower variant.
    #[error("http failure ({status}): {message}")]
    HttpFailure { status: u16, message: String },

    /// The service answered with a 5xx status.
    #[error("service error ({status}): {message}")]
    ServiceError { status: u16, message: String },

    /// The service rejected the credential (401) or the caller (403).
    #[error("authorization error ({status}): {message}")]
    AuthError { status: u16, message: String },

    /// The requested agent, passport, or policy pack does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// A response arrived but could not be decoded into the expected shape.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// The operation needs an API key and none is configured.
    #[error("operation '{operation}' requires an API key")]
    AuthRequired { operation: String },

    /// The caller aborted the call before it completed.
    #[error("call cancelled")]
    Cancelled,

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

/// Discriminant of `AportError` without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NetworkFailure,
    HttpFailure,
    ServiceError,
    AuthError,
    NotFound,
    MalformedResponse,
    AuthRequired,
    Cancelled,
    ConfigError,
}

impl ErrorKind {
    /// Stable snake_case name, used in CLI output and guard responses.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NetworkFailure => "network_failure",
            Self::HttpFailure => "http_failure",
            Self::ServiceError => "service_error",
            Self::AuthError => "auth_error",
            Self::NotFound => "not_found",
            Self::MalformedResponse => "malformed_response",
            Self::AuthRequired => "auth_required",
            Self::Cancelled => "cancelled",
            Self::ConfigError => "config_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AportError {
    /// Return the payload-free discriminant of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NetworkFailure { .. } => ErrorKind::NetworkFailure,
            Self::HttpFailure { .. } => ErrorKind::HttpFailure,
            Self::ServiceError { .. } => ErrorKind::ServiceError,
            Self::AuthError { .. } => ErrorKind::AuthError,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::AuthRequired { .. } => ErrorKind::AuthRequired,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::ConfigError { .. } => ErrorKind::ConfigError,
        }
    }

    /// True for failures a caller-side retry may resolve.
    ///
    /// Only transport failures and 5xx responses qualify. Auth, validation,
    /// and parse failures are deterministic and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure { .. } | Self::ServiceError { .. })
    }

    /// The HTTP status carried by this error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpFailure { status, .. }
            | Self::ServiceError { status, .. }
            | Self::AuthError { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

/// Failure raised by a transport when no HTTP response was obtained.
///
/// Kept separate from `AportError` so the transport layer cannot express
/// HTTP-level outcomes; those are always returned as a response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, DNS, TLS, or body read failure.
    #[error("{reason}")]
    Network { reason: String },

    /// The request did not complete within its budget.
    #[error("request timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },
}

impl From<TransportError> for AportError {
    fn from(err: TransportError) -> Self {
        AportError::NetworkFailure {
            reason: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the APort crates.
pub type AportResult<T> = Result<T, AportError>;
