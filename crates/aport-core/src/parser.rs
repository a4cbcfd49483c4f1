//! Decision parser and response decoders.
//!
//! The service wraps decisions in one of two envelopes:
//!
//! - Shape A: `{"data": {"decision": {...}}}`
//! - Shape B: `{"decision": {...}}`
//!
//! Shape A is checked first and wins whenever `data.decision` is present and
//! non-null; otherwise the top-level `decision` is used; otherwise the
//! response is `MalformedResponse`. A missing `allow` is also
//! `MalformedResponse`, never an implicit deny, so a parsing bug cannot be
//! mistaken for a policy decision. A missing `decision_id` is treated the same
//! way: callers key idempotency and audit records on it.
//!
//! The passport next to a decision is advisory. One that fails to decode is
//! logged and dropped; the decision still stands.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use aport_contracts::{
    decision::{Decision, Reason, VerificationResult, UNKNOWN_REASON},
    error::{AportError, AportResult},
    passport::{Passport, SuspendOutcome},
    policy_pack::{PolicyPackDetail, PolicyPackSummary},
};

/// The decision object as the service sends it. Every field is optional here
/// so that presence can be checked explicitly.
#[derive(Debug, Deserialize)]
struct WireDecision {
    allow: Option<bool>,
    #[serde(alias = "decisionId")]
    decision_id: Option<String>,
    #[serde(alias = "expiresIn")]
    expires_in: Option<u64>,
    reasons: Option<Vec<WireReason>>,
    #[serde(alias = "assuranceLevel")]
    assurance_level: Option<String>,
    #[serde(alias = "createdAt")]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireReason {
    code: Option<String>,
    message: Option<String>,
    severity: Option<String>,
}

fn malformed(reason: impl Into<String>) -> AportError {
    AportError::MalformedResponse {
        reason: reason.into(),
    }
}

fn parse_json(body: &str) -> AportResult<Value> {
    serde_json::from_str(body).map_err(|e| malformed(format!("response body is not JSON: {}", e)))
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Pick the decision object out of either envelope, in fixed order.
fn select_decision(root: &Value) -> Option<&Value> {
    non_null(root.get("data").and_then(|d| d.get("decision")))
        .or_else(|| non_null(root.get("decision")))
}

/// Pick the passport object, preferring the `data` envelope.
fn select_passport(root: &Value) -> Option<&Value> {
    non_null(root.get("data").and_then(|d| d.get("passport")))
        .or_else(|| non_null(root.get("passport")))
}

/// Normalize a decision object into a `Decision`.
pub fn decode_decision(value: &Value) -> AportResult<Decision> {
    let wire: WireDecision = serde_json::from_value(value.clone())
        .map_err(|e| malformed(format!("decision object is invalid: {}", e)))?;

    let allow = wire
        .allow
        .ok_or_else(|| malformed("decision is missing 'allow'"))?;
    let decision_id = wire
        .decision_id
        .ok_or_else(|| malformed("decision is missing 'decision_id'"))?;

    let reasons = wire
        .reasons
        .unwrap_or_default()
        .into_iter()
        .map(|r| Reason {
            code: r.code,
            message: r.message.unwrap_or_else(|| UNKNOWN_REASON.to_string()),
            severity: r.severity,
        })
        .collect();

    Ok(Decision {
        allow,
        decision_id,
        expires_in_seconds: wire.expires_in.unwrap_or(0),
        reasons,
        assurance_level: wire.assurance_level,
        created_at: wire.created_at,
    })
}

/// Parse a verify response body into a `VerificationResult`.
///
/// Fails with `MalformedResponse` when neither envelope holds a decision, or
/// when the decision lacks `allow` or `decision_id`. An undecodable passport
/// only produces `passport: None`.
pub fn parse_verification(body: &str) -> AportResult<VerificationResult> {
    let root = parse_json(body)?;

    let decision_value = select_decision(&root)
        .ok_or_else(|| malformed("response has neither 'data.decision' nor 'decision'"))?;
    let decision = decode_decision(decision_value)?;

    let passport = select_passport(&root).and_then(|p| match serde_json::from_value::<Passport>(p.clone()) {
        Ok(passport) => Some(passport),
        Err(e) => {
            warn!(
                decision_id = %decision.decision_id,
                error = %e,
                "dropping undecodable passport from verify response"
            );
            None
        }
    });

    Ok(VerificationResult::new(decision, passport))
}

/// Parse a passport body: bare, `{"data": {...}}`, or `{"passport": {...}}`.
pub fn parse_passport(body: &str) -> AportResult<Passport> {
    let root = parse_json(body)?;
    let candidate = select_passport(&root)
        .or_else(|| non_null(root.get("data")))
        .unwrap_or(&root);

    serde_json::from_value(candidate.clone())
        .map_err(|e| malformed(format!("passport object is invalid: {}", e)))
}

/// Parse a suspend body: `{"success": bool}`, optionally under `data`.
pub fn parse_suspend(body: &str) -> AportResult<SuspendOutcome> {
    let root = parse_json(body)?;
    let success = root
        .get("success")
        .or_else(|| root.get("data").and_then(|d| d.get("success")))
        .and_then(Value::as_bool)
        .ok_or_else(|| malformed("suspend response is missing boolean 'success'"))?;
    Ok(SuspendOutcome { success })
}

/// Parse a policy pack listing: a bare array, `{"data": [...]}`, or
/// `{"policies": [...]}`.
pub fn parse_policy_list(body: &str) -> AportResult<Vec<PolicyPackSummary>> {
    let root = parse_json(body)?;
    let list = if root.is_array() {
        &root
    } else {
        root.get("data")
            .filter(|d| d.is_array())
            .or_else(|| root.get("policies").filter(|p| p.is_array()))
            .ok_or_else(|| malformed("policy listing is not an array"))?
    };

    serde_json::from_value(list.clone())
        .map_err(|e| malformed(format!("policy listing is invalid: {}", e)))
}

/// Parse a policy pack detail body, bare or under `data`.
pub fn parse_policy_detail(body: &str) -> AportResult<PolicyPackDetail> {
    let root = parse_json(body)?;
    let candidate = non_null(root.get("data")).unwrap_or(&root);
    serde_json::from_value(candidate.clone())
        .map_err(|e| malformed(format!("policy pack is invalid: {}", e)))
}

/// Best human-readable message from an error body: `message`, then `error`
/// (string, or object with `message`), then the raw text.
pub fn error_message(body: &str) -> String {
    if let Ok(root) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = root.get("message").and_then(Value::as_str) {
            return msg.to_string();
        }
        match root.get("error") {
            Some(Value::String(msg)) => return msg.clone(),
            Some(obj) => {
                if let Some(msg) = obj.get("message").and_then(Value::as_str) {
                    return msg.to_string();
                }
            }
            None => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        UNKNOWN_REASON.to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
