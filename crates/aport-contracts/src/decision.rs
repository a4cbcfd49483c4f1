//! Decision and verification result types.
//!
//! A `Decision` is the service's verdict for one verify call. The client
//! normalizes both response envelope shapes into this single type, so callers
//! never see which shape the service used.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::passport::Passport;

/// Message used when the service gave no explanation for a denial.
pub const UNKNOWN_REASON: &str = "Unknown";

/// One explanation attached to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    /// Machine-readable code (e.g. "LIMIT_EXCEEDED"), when the service sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable explanation.
    pub message: String,
    /// Severity label (e.g. "error", "warning"), when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

impl Reason {
    /// A reason with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            severity: None,
        }
    }

    /// A reason with a code and a message.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            severity: None,
        }
    }
}

/// The normalized verdict returned for a single verify call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the action is authorized.
    pub allow: bool,
    /// Opaque audit-correlation id. Unique per call.
    pub decision_id: String,
    /// Validity window suggested by the service. The client never enforces it.
    pub expires_in_seconds: u64,
    /// Ordered explanations. Usually empty on allow.
    pub reasons: Vec<Reason>,
    /// Assurance level of the verified passport, on responses that carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assurance_level: Option<String>,
    /// Service-side creation time, on responses that carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Decision {
    /// Join the reason messages into one line for logs and error bodies.
    ///
    /// Returns `"Unknown"` when the service supplied no reasons at all.
    pub fn denial_summary(&self) -> String {
        if self.reasons.is_empty() {
            return UNKNOWN_REASON.to_string();
        }
        self.reasons
            .iter()
            .map(|r| match &r.code {
                Some(code) => format!("[{}] {}", code, r.message),
                None => r.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Return true if any reason carries the given code.
    pub fn has_reason_code(&self, code: &str) -> bool {
        self.reasons.iter().any(|r| r.code.as_deref() == Some(code))
    }
}

/// What the client returns from every verify call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Mirrors `decision.allow`.
    pub verified: bool,
    /// The normalized decision.
    pub decision: Decision,
    /// The agent's passport, when the service attached one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport: Option<Passport>,
}

impl VerificationResult {
    /// Wrap a decision, deriving `verified` from `allow`.
    pub fn new(decision: Decision, passport: Option<Passport>) -> Self {
        Self {
            verified: decision.allow,
            decision,
            passport,
        }
    }
}
