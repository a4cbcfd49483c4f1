//! Checkpoint rule types and configuration schema.
//!
//! A `CheckpointConfig` is deserialized from TOML and holds an ordered list of
//! `CheckpointRule`s, one per workflow node that needs its own policy or
//! capabilities. The first matching rule wins. Nodes without a rule are
//! verified against the guard's default policy.

use std::path::Path;

use serde::{Deserialize, Serialize};

use aport_contracts::error::{AportError, AportResult};

/// Verification requirements for one workflow node.
///
/// `node = "*"` matches every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRule {
    pub node: String,

    /// Policy pack to verify against. Falls back to the guard's default.
    #[serde(default)]
    pub policy: Option<String>,

    /// Capabilities the agent's passport must list before the node may run.
    #[serde(default)]
    pub required_capabilities: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,
}

impl CheckpointRule {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            policy: None,
            required_capabilities: Vec::new(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    #[must_use]
    pub fn requiring(mut self, capability: impl Into<String>) -> Self {
        self.required_capabilities.push(capability.into());
        self
    }

    pub fn matches(&self, node: &str) -> bool {
        self.node == "*" || self.node == node
    }
}

/// The top-level structure deserialized from a TOML checkpoint file.
///
/// ```toml
/// [[rules]]
/// node = "issue_refund"
/// policy = "payments.refund.v1"
/// required_capabilities = ["payments.refund"]
///
/// [[rules]]
/// node = "*"
/// policy = "workflow.transition.v1"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub rules: Vec<CheckpointRule>,
}

impl CheckpointConfig {
    pub fn from_toml_str(s: &str) -> AportResult<Self> {
        toml::from_str(s).map_err(|e| AportError::ConfigError {
            reason: format!("failed to parse checkpoint rules TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> AportResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AportError::ConfigError {
            reason: format!("failed to read checkpoint rules '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// First rule matching `node`, in declaration order.
    pub fn rule_for(&self, node: &str) -> Option<&CheckpointRule> {
        self.rules.iter().find(|rule| rule.matches(node))
    }
}
