//! Policy pack listing and detail types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::passport::LimitValue;

/// One entry of `GET /api/policies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPackSummary {
    /// Versioned identifier, e.g. `payments.refund.v1`.
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// The full body of `GET /api/policies/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyPackDetail {
    #[serde(flatten)]
    pub summary: PolicyPackSummary,
    /// Capabilities a passport must hold for the pack to allow.
    #[serde(default)]
    pub requires_capabilities: Vec<String>,
    /// Minimum passport assurance level, if the pack sets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_assurance: Option<String>,
    /// Limit keys the pack checks, with the pack's own ceilings.
    #[serde(default)]
    pub limits: BTreeMap<String, LimitValue>,
    /// Context keys a verify call must supply for this pack.
    #[serde(default)]
    pub required_context: Vec<String>,
}
