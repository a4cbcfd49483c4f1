//! Request builder: pure functions from caller arguments to wire payloads.
//!
//! Every function here validates its identifiers before anything else, so an
//! empty policy or agent id fails locally and no request is ever sent.

use aport_contracts::{
    error::{AportError, AportResult},
    passport::Passport,
    request::{Context, SuspendPayload, VerifyEnvelope, VerifyPayload},
};

/// Reject empty or whitespace-only identifiers.
pub fn require_id(field: &str, value: &str) -> AportResult<()> {
    if value.trim().is_empty() {
        return Err(AportError::Validation {
            reason: format!("{} must be a non-empty string", field),
        });
    }
    Ok(())
}

/// Build the body of `POST /api/verify/policy/{policy}`.
///
/// The caller's context map is cloned, never modified.
pub fn verify_payload(policy: &str, agent_id: &str, context: &Context) -> AportResult<VerifyPayload> {
    require_id("policy", policy)?;
    require_id("agent_id", agent_id)?;

    Ok(VerifyPayload {
        context: VerifyEnvelope {
            agent_id: agent_id.to_string(),
            policy_id: policy.to_string(),
            context: context.clone(),
        },
    })
}

/// Build the body of `POST /api/suspend`.
pub fn suspend_payload(agent_id: &str, reason: &str) -> AportResult<SuspendPayload> {
    require_id("agent_id", agent_id)?;
    Ok(SuspendPayload {
        agent_id: agent_id.to_string(),
        reason: reason.to_string(),
    })
}

/// Build the body of `POST /api/issue`: the passport object itself.
pub fn passport_payload(passport: &Passport) -> AportResult<serde_json::Value> {
    require_id("agent_id", &passport.agent_id)?;
    serde_json::to_value(passport).map_err(|e| AportError::Validation {
        reason: format!("passport is not serializable: {}", e),
    })
}

pub fn verify_path(policy: &str) -> String {
    format!("/api/verify/policy/{}", encode_segment(policy))
}

pub fn passport_path(agent_id: &str) -> String {
    format!("/api/passports/{}", encode_segment(agent_id))
}

pub fn policy_pack_path(pack_id: &str) -> String {
    format!("/api/policies/{}", encode_segment(pack_id))
}

/// Percent-encode everything outside the RFC 3986 unreserved set, so an
/// identifier always stays a single path segment.
pub fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}
