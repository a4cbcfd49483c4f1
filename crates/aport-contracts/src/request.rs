//! Wire payloads sent to the verification service.
//!
//! These mirror the JSON bodies exactly. They are built by the request
//! builder in aport-core and serialized by the transport.

use serde::{Deserialize, Serialize};

/// Free-form verification context, forwarded verbatim to the service.
pub type Context = serde_json::Map<String, serde_json::Value>;

/// Body of `POST /api/verify/policy/{policy}`.
///
/// ```json
/// {"context": {"agent_id": "...", "policy_id": "...", "context": {...}}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyPayload {
    pub context: VerifyEnvelope,
}

/// The inner `context` object of a verify payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyEnvelope {
    pub agent_id: String,
    pub policy_id: String,
    pub context: Context,
}

/// Body of `POST /api/suspend`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendPayload {
    pub agent_id: String,
    pub reason: String,
}

/// One entry of a batch verify call.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyRequest {
    pub policy: String,
    pub agent_id: String,
    pub context: Context,
}

impl VerifyRequest {
    pub fn new(policy: impl Into<String>, agent_id: impl Into<String>, context: Context) -> Self {
        Self {
            policy: policy.into(),
            agent_id: agent_id.into(),
            context,
        }
    }
}
