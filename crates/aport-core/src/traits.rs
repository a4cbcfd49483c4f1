//! The transport seam of the verification client.
//!
//! `Transport` is the only I/O boundary in the client. Production code uses
//! [`HttpTransport`](crate::http::HttpTransport); tests and the in-process
//! mock service supply their own implementations. Business logic never
//! branches on which one is in use.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use aport_contracts::error::TransportError;

/// HTTP method of a transport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Everything a transport needs to issue one request.
///
/// `path` is relative to the transport's base URL and already percent-encoded.
#[derive(Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// Bearer credential. `None` sends the request unauthenticated.
    pub bearer: Option<String>,
    pub idempotency_key: Option<String>,
    /// Budget for the whole round trip.
    pub timeout: Duration,
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .field("idempotency_key", &self.idempotency_key)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Raw outcome of a request that reached the service.
///
/// Returned for every status code, including 4xx and 5xx; mapping statuses to
/// errors is the client's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Build a response whose body is the serialized JSON `value`.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }
}

/// Sends one request to the verification service.
///
/// Implementations must not retry and must return `Ok` for any HTTP response.
/// `Err` is reserved for requests that produced no response at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
