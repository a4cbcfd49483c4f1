//! HTTPS transport backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;

use aport_contracts::error::{AportError, AportResult, TransportError};

use crate::config::ClientConfig;
use crate::traits::{Method, Transport, TransportRequest, TransportResponse};

pub const USER_AGENT: &str = concat!("aport-rust/", env!("CARGO_PKG_VERSION"));

const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// Sends requests to `base_url` over HTTP(S).
///
/// Every request carries `Accept` and `Content-Type: application/json` plus
/// the configured user agent. The bearer header is only attached when the
/// request asks for it.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> AportResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AportError::ConfigError {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(error: reqwest::Error, budget: Duration) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout { after: budget }
        } else {
            TransportError::Network {
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let budget = request.timeout;

        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        }
        .timeout(budget)
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/json");

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY, key);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = request.method.as_str(), url = %url, "sending request");

        let response = builder
            .send()
            .await
            .map_err(|e| Self::classify(e, budget))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::classify(e, budget))?;

        Ok(TransportResponse { status, body })
    }
}
