//! Agent-ID resolution for inbound requests.
//!
//! `InboundRequest` is a framework-neutral view of an HTTP request: just the
//! parts a guard reads. Adapters for a concrete server framework copy those
//! parts in and hand the request to a [`PolicyGuard`](crate::PolicyGuard).

use serde_json::Value;

pub const HEADER_AGENT_ID: &str = "x-agent-id";
pub const HEADER_APORT_AGENT_ID: &str = "x-aport-agent-id";

/// The parts of an inbound request a guard needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    /// Header names are matched case-insensitively.
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    /// Parsed JSON body, if the request had one.
    pub body: Option<Value>,
    pub remote_ip: Option<String>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_remote_ip(mut self, ip: impl Into<String>) -> Self {
        self.remote_ip = Some(ip.into());
        self
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// String field `name` of a JSON object body.
    pub fn body_field(&self, name: &str) -> Option<&str> {
        self.body.as_ref()?.get(name)?.as_str()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }
}

/// Picks the agent id to verify from an inbound request.
///
/// Sources in priority order:
///
/// 1. header `X-Agent-ID`
/// 2. header `X-APort-Agent-ID`
/// 3. query parameter `agent_id`
/// 4. body field `agent_id`
/// 5. body field `agentId`
/// 6. the configured fallback
///
/// Empty or whitespace-only values are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentIdResolver {
    fallback: Option<String>,
}

impl AgentIdResolver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fallback(mut self, agent_id: impl Into<String>) -> Self {
        self.fallback = Some(agent_id.into());
        self
    }

    pub fn resolve(&self, request: &InboundRequest) -> Option<String> {
        [
            request.header(HEADER_AGENT_ID),
            request.header(HEADER_APORT_AGENT_ID),
            request.query_param("agent_id"),
            request.body_field("agent_id"),
            request.body_field("agentId"),
            self.fallback.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
    }
}
