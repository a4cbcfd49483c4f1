//! Sample passports and policy packs for the in-process mock service.
//!
//! All data in this module is hardcoded and fictional. The three agent ids
//! are the sample agents used throughout the APort hello-world material.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use aport_contracts::{
    passport::{CapabilityGrant, LimitValue, Passport, PassportStatus},
    policy_pack::{PolicyPackDetail, PolicyPackSummary},
};

pub const REFUND_BOT: &str = "ap_128094d3";
pub const DATA_EXPORTER: &str = "agt_tmpl_mg8jr8l1_geckvz";
pub const PR_MERGER: &str = "agt_tmpl_mg8jtzzk_rl0diw";

/// Any agent id containing this marker is denied by the mock.
pub const DENIED_MARKER: &str = "denied";

pub const REFUND_POLICY: &str = "payments.refund.v1";
pub const EXPORT_POLICY: &str = "data.export.v1";
pub const MERGE_POLICY: &str = "repo.v1";
pub const WORKFLOW_POLICY: &str = "workflow.transition.v1";

// ── Passports ────────────────────────────────────────────────────────────────

fn grant(id: &str, params: Value) -> CapabilityGrant {
    CapabilityGrant {
        id: id.to_string(),
        params: params.as_object().cloned().unwrap_or_default(),
    }
}

fn limits(pairs: &[(&str, LimitValue)]) -> BTreeMap<String, LimitValue> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn metadata(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// The refund bot: may refund up to 100 USD per call.
pub fn refund_bot() -> Passport {
    Passport {
        agent_id: REFUND_BOT.to_string(),
        name: "Refund Bot".to_string(),
        capabilities: vec![
            grant("payments.refund", json!({ "currency": ["USD", "EUR"] })),
            grant("workflow.transition", json!({})),
        ],
        limits: limits(&[
            ("refund_amount_max_per_tx", LimitValue::Integer(100)),
            ("refund_amount_daily_cap", LimitValue::Integer(1000)),
        ]),
        regions: vec!["US".to_string(), "EU".to_string()],
        status: PassportStatus::Active,
        metadata: metadata(json!({ "template": "refund-bot", "owner": "support" })),
    }
}

pub fn data_exporter() -> Passport {
    Passport {
        agent_id: DATA_EXPORTER.to_string(),
        name: "Data Exporter".to_string(),
        capabilities: vec![grant("data.export", json!({ "formats": ["csv", "json"] }))],
        limits: limits(&[
            ("max_export_rows", LimitValue::Integer(10_000)),
            ("allow_pii", LimitValue::Bool(false)),
        ]),
        regions: vec!["US".to_string()],
        status: PassportStatus::Active,
        metadata: metadata(json!({ "template": "data-exporter" })),
    }
}

/// The PR merger is suspended, so every fresh verify call for it is denied.
pub fn pr_merger() -> Passport {
    Passport {
        agent_id: PR_MERGER.to_string(),
        name: "PR Merger".to_string(),
        capabilities: vec![grant("repo.pr.merge", json!({})), grant("repo.pr.create", json!({}))],
        limits: limits(&[
            ("max_prs_per_day", LimitValue::Integer(10)),
            ("max_pr_size_kb", LimitValue::Integer(500)),
        ]),
        regions: vec!["global".to_string()],
        status: PassportStatus::Suspended,
        metadata: metadata(json!({ "template": "pr-merger", "suspended_reason": "review pending" })),
    }
}

pub fn sample_passports() -> Vec<Passport> {
    vec![refund_bot(), data_exporter(), pr_merger()]
}

/// Passport the mock attaches to an allow for an agent it has no record of.
pub fn ephemeral_passport(agent_id: &str) -> Passport {
    let mut passport = Passport::new(agent_id, "");
    passport.capabilities = vec![grant("read", json!({})), grant("write", json!({}))];
    passport.limits = limits(&[
        ("requests", LimitValue::Integer(1000)),
        ("period", LimitValue::Text("1h".to_string())),
    ]);
    passport
}

// ── Policy packs ─────────────────────────────────────────────────────────────

fn pack(
    id: &str,
    name: &str,
    description: &str,
    capabilities: &[&str],
    min_assurance: Option<&str>,
    pack_limits: &[(&str, LimitValue)],
    required_context: &[&str],
) -> PolicyPackDetail {
    PolicyPackDetail {
        summary: PolicyPackSummary {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            version: Some("1.0.0".to_string()),
            status: Some("active".to_string()),
        },
        requires_capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        min_assurance: min_assurance.map(str::to_string),
        limits: limits(pack_limits),
        required_context: required_context.iter().map(|c| c.to_string()).collect(),
    }
}

pub fn sample_policy_packs() -> Vec<PolicyPackDetail> {
    vec![
        pack(
            REFUND_POLICY,
            "Payment Refunds",
            "Refunds within per-transaction and daily caps",
            &["payments.refund"],
            Some("L2"),
            &[("refund_amount_max_per_tx", LimitValue::Integer(100))],
            &["amount", "currency"],
        ),
        pack(
            EXPORT_POLICY,
            "Data Export",
            "Bulk exports of customer data",
            &["data.export"],
            Some("L1"),
            &[("max_export_rows", LimitValue::Integer(10_000))],
            &["rows", "format"],
        ),
        pack(
            MERGE_POLICY,
            "Repository Operations",
            "Pull request creation and merging",
            &["repo.pr.merge"],
            Some("L2"),
            &[("max_pr_size_kb", LimitValue::Integer(500))],
            &["repository", "pr_size_kb"],
        ),
        pack(
            WORKFLOW_POLICY,
            "Workflow Transitions",
            "State transitions in multi-step agent workflows",
            &[],
            None,
            &[],
            &[],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_agents_are_distinct_and_only_pr_merger_is_suspended() {
        let passports = sample_passports();
        assert_eq!(passports.len(), 3);
        let active: Vec<_> = passports.iter().filter(|p| p.status.is_active()).map(|p| p.agent_id.as_str()).collect();
        assert_eq!(active, vec![REFUND_BOT, DATA_EXPORTER]);
    }

    #[test]
    fn refund_bot_holds_refund_capability() {
        let bot = refund_bot();
        assert!(bot.has_capability("payments.refund"));
        assert_eq!(bot.limit("refund_amount_max_per_tx").and_then(LimitValue::as_f64), Some(100.0));
    }

    #[test]
    fn every_pack_has_a_unique_id() {
        let packs = sample_policy_packs();
        let mut ids: Vec<_> = packs.iter().map(|p| p.summary.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), packs.len());
    }
}
