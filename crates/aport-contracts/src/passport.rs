//! Passport types.
//!
//! A passport describes an agent: what it may do (capabilities), how much
//! (limits), where (regions), and whether it is currently usable (status).
//! The service owns passports; the client only reads and forwards them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle status of a passport.
///
/// Any status other than `Active` means the service denies fresh verify calls
/// for the agent. Unrecognized values are preserved in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PassportStatus {
    #[default]
    Active,
    Suspended,
    Revoked,
    Draft,
    Other(String),
}

impl PassportStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Revoked => "revoked",
            Self::Draft => "draft",
            Self::Other(s) => s,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl From<&str> for PassportStatus {
    fn from(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "suspended" => Self::Suspended,
            "revoked" => Self::Revoked,
            "draft" => Self::Draft,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PassportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PassportStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PassportStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(PassportStatus::from(s.as_str()))
    }
}

/// A capability held by an agent, optionally parameterized.
///
/// The service sends either a bare string (`"payments.refund"`) or an object
/// (`{"id": "payments.refund", "params": {...}}`); both deserialize here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityGrant {
    pub id: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl CapabilityGrant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: serde_json::Map::new(),
        }
    }
}

impl<'de> Deserialize<'de> for CapabilityGrant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Bare(String),
            Full {
                id: String,
                #[serde(default)]
                params: serde_json::Map<String, serde_json::Value>,
            },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Bare(id) => CapabilityGrant::new(id),
            Wire::Full { id, params } => CapabilityGrant { id, params },
        })
    }
}

/// A single limit value. Limits are numeric caps or boolean switches; some
/// deployments also send text (e.g. a period like `"1h"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl LimitValue {
    /// Numeric view of the limit, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An agent passport as returned by the service.
///
/// Every field but `agent_id` may be missing or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passport {
    /// The agent this passport belongs to.
    #[serde(alias = "agentId")]
    pub agent_id: String,
    /// Display name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub capabilities: Vec<CapabilityGrant>,
    /// Keyed limits, e.g. `refund_amount_max_per_tx`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub limits: BTreeMap<String, LimitValue>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub regions: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PassportStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Passport {
    /// A minimal active passport with no capabilities or limits.
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            capabilities: Vec::new(),
            limits: BTreeMap::new(),
            regions: Vec::new(),
            status: PassportStatus::Active,
            metadata: serde_json::Map::new(),
        }
    }

    /// Return true if the passport lists the capability `id`.
    pub fn has_capability(&self, id: &str) -> bool {
        self.capabilities.iter().any(|c| c.id == id)
    }

    /// Look up a limit by key.
    pub fn limit(&self, key: &str) -> Option<&LimitValue> {
        self.limits.get(key)
    }
}

/// Result of a suspend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendOutcome {
    pub success: bool,
}
