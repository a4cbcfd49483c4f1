//! Verification guard for agent workflows.
//!
//! `CheckpointGuard` verifies an agent before a workflow node runs or a state
//! transition happens. Workflow state is a JSON object; the guard reads the
//! agent id from it and records the outcome back into it under
//! [`STATE_VERIFICATION`] or [`STATE_VERIFICATION_ERROR`].
//!
//! Checkpoint persistence goes through [`CheckpointGuard::verify_checkpoint_save`]
//! before the saved state is written anywhere.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use aport_contracts::{error::AportError, passport::Passport, request::Context};
use aport_core::VerificationClient;

use crate::rule::{CheckpointConfig, CheckpointRule};

pub const DEFAULT_WORKFLOW_POLICY: &str = "workflow.transition.v1";

pub const STATE_VERIFICATION: &str = "_aport_verification";
pub const STATE_VERIFICATION_ERROR: &str = "_aport_verification_error";

/// State keys searched for the agent id, in order.
pub const AGENT_ID_KEYS: [&str; 5] = ["agent_id", "agentId", "agent", "user_id", "userId"];

/// Workflow state as seen by the guard.
pub type WorkflowState = serde_json::Map<String, Value>;

/// Custom agent-id lookup, used instead of [`extract_agent_id`].
pub type AgentIdExtractor = Arc<dyn Fn(&WorkflowState) -> Option<String> + Send + Sync>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("agent id not found in state for node '{node}'")]
    MissingAgentId { node: String },

    #[error("agent '{agent_id}' denied at checkpoint '{checkpoint_id}' ({decision_id}): {reasons}")]
    Denied {
        agent_id: String,
        checkpoint_id: String,
        reasons: String,
        decision_id: String,
    },

    #[error("node '{node}' requires capability '{capability}' which agent '{agent_id}' does not hold")]
    CapabilityMissing {
        agent_id: String,
        node: String,
        capability: String,
    },

    #[error("checkpoint verification failed: {0}")]
    Client(#[from] AportError),
}

/// A successful checkpoint verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointVerification {
    pub verified: bool,
    pub agent_id: String,
    pub policy: String,
    pub checkpoint_id: String,
    pub decision_id: String,
    pub expires_in_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub passport: Option<Passport>,
}

/// How `guard_node` let a node through.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeGuard {
    Verified(CheckpointVerification),
    /// Non-strict mode, no agent id in state.
    Skipped,
    /// Non-strict mode, verification failed; the error is in the state.
    Unverified { error: String },
}

#[derive(Clone)]
pub struct CheckpointGuard {
    client: VerificationClient,
    default_policy: String,
    strict: bool,
    config: CheckpointConfig,
    extractor: Option<AgentIdExtractor>,
}

impl fmt::Debug for CheckpointGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointGuard")
            .field("default_policy", &self.default_policy)
            .field("strict", &self.strict)
            .field("config", &self.config)
            .field("custom_extractor", &self.extractor.is_some())
            .finish_non_exhaustive()
    }
}

impl CheckpointGuard {
    /// Strict guard using [`DEFAULT_WORKFLOW_POLICY`] and no node rules.
    pub fn new(client: VerificationClient) -> Self {
        Self {
            client,
            default_policy: DEFAULT_WORKFLOW_POLICY.to_string(),
            strict: true,
            config: CheckpointConfig::default(),
            extractor: None,
        }
    }

    #[must_use]
    pub fn with_default_policy(mut self, policy: impl Into<String>) -> Self {
        self.default_policy = policy.into();
        self
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: CheckpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default state lookup with `extractor`.
    #[must_use]
    pub fn with_agent_id_extractor<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&WorkflowState) -> Option<String> + Send + Sync + 'static,
    {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    pub fn add_rule(&mut self, rule: CheckpointRule) {
        debug!(node = %rule.node, "checkpoint rule added");
        self.config.rules.push(rule);
    }

    pub fn default_policy(&self) -> &str {
        &self.default_policy
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Verify `agent_id` at `checkpoint_id`.
    ///
    /// The context sent is `{checkpoint_id, state_keys, timestamp}` with the
    /// caller's `context` merged over it.
    pub async fn verify_checkpoint(
        &self,
        policy: &str,
        agent_id: &str,
        checkpoint_id: &str,
        state: &WorkflowState,
        context: &Context,
    ) -> Result<CheckpointVerification, CheckpointError> {
        let mut state_keys: Vec<&String> = state.keys().collect();
        state_keys.sort();

        let mut ctx = Context::new();
        ctx.insert("checkpoint_id".to_string(), json!(checkpoint_id));
        ctx.insert("state_keys".to_string(), json!(state_keys));
        ctx.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
        for (key, value) in context {
            ctx.insert(key.clone(), value.clone());
        }

        debug!(policy = %policy, agent_id = %agent_id, checkpoint_id = %checkpoint_id, "verifying checkpoint");
        let result = self.client.verify(policy, agent_id, &ctx).await?;
        let decision = result.decision;

        if !result.verified {
            warn!(
                agent_id = %agent_id,
                checkpoint_id = %checkpoint_id,
                decision_id = %decision.decision_id,
                "checkpoint denied"
            );
            return Err(CheckpointError::Denied {
                agent_id: agent_id.to_string(),
                checkpoint_id: checkpoint_id.to_string(),
                reasons: decision.denial_summary(),
                decision_id: decision.decision_id,
            });
        }

        info!(agent_id = %agent_id, checkpoint_id = %checkpoint_id, decision_id = %decision.decision_id, "checkpoint verified");
        Ok(CheckpointVerification {
            verified: true,
            agent_id: agent_id.to_string(),
            policy: policy.to_string(),
            checkpoint_id: checkpoint_id.to_string(),
            decision_id: decision.decision_id,
            expires_in_seconds: decision.expires_in_seconds,
            created_at: decision.created_at,
            passport: result.passport,
        })
    }

    /// Verify a move from state `from` to state `to`.
    ///
    /// The checkpoint id is `transition_{from}_to_{to}`.
    pub async fn verify_state_transition(
        &self,
        policy: &str,
        agent_id: &str,
        from: &str,
        to: &str,
        state: &WorkflowState,
        context: &Context,
    ) -> Result<CheckpointVerification, CheckpointError> {
        let state_data_size = if state.is_empty() {
            0
        } else {
            Value::Object(state.clone()).to_string().len()
        };

        let mut ctx = Context::new();
        ctx.insert("transition".to_string(), json!(format!("{} -> {}", from, to)));
        ctx.insert("from_state".to_string(), json!(from));
        ctx.insert("to_state".to_string(), json!(to));
        ctx.insert("state_data_size".to_string(), json!(state_data_size));
        for (key, value) in context {
            ctx.insert(key.clone(), value.clone());
        }

        let checkpoint_id = format!("transition_{}_to_{}", from, to);
        self.verify_checkpoint(policy, agent_id, &checkpoint_id, state, &ctx)
            .await
    }

    /// Verify the agent in `state` before running `node`.
    ///
    /// In strict mode every failure is returned. Otherwise a missing agent id
    /// skips verification, and any other failure is written into the state
    /// under [`STATE_VERIFICATION_ERROR`] and the node proceeds.
    pub async fn guard_node(
        &self,
        node: &str,
        state: &mut WorkflowState,
    ) -> Result<NodeGuard, CheckpointError> {
        let Some(agent_id) = self.agent_id_in(state) else {
            if self.strict {
                return Err(CheckpointError::MissingAgentId {
                    node: node.to_string(),
                });
            }
            warn!(node = %node, "agent id not found in state; skipping verification");
            return Ok(NodeGuard::Skipped);
        };

        match self.verify_node(node, &agent_id, state).await {
            Ok(verification) => {
                let record = serde_json::to_value(&verification).unwrap_or(Value::Null);
                state.insert(STATE_VERIFICATION.to_string(), record);
                Ok(NodeGuard::Verified(verification))
            }
            Err(e) if self.strict => Err(e),
            Err(e) => {
                warn!(node = %node, agent_id = %agent_id, error = %e, "node verification failed; proceeding");
                let error = e.to_string();
                state.insert(STATE_VERIFICATION_ERROR.to_string(), json!(error));
                Ok(NodeGuard::Unverified { error })
            }
        }
    }

    /// Verify a checkpoint before it is persisted.
    ///
    /// Only strict guards verify saves. The agent id comes from the custom
    /// extractor if one is set, otherwise from `checkpoint.state`, otherwise
    /// from `agent_id` / `user_id` under `run_config.configurable`. The
    /// checkpoint id is `save_{run_id}`, with `run_id` read from `run_config`.
    ///
    /// Returns `Ok(None)` when the save was not verified (lenient guard or no
    /// agent id); an error means the save must not happen.
    pub async fn verify_checkpoint_save(
        &self,
        checkpoint: &WorkflowState,
        run_config: &WorkflowState,
    ) -> Result<Option<CheckpointVerification>, CheckpointError> {
        if !self.strict {
            return Ok(None);
        }
        let Some(agent_id) = self.saved_agent_id(checkpoint, run_config) else {
            debug!("no agent id on checkpoint save; not verified");
            return Ok(None);
        };

        let run_id = match run_config.get("run_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "unknown".to_string(),
        };

        let mut context = Context::new();
        context.insert("operation".to_string(), json!("save_checkpoint"));

        let verification = self
            .verify_checkpoint(
                &self.default_policy,
                &agent_id,
                &format!("save_{}", run_id),
                checkpoint,
                &context,
            )
            .await?;
        Ok(Some(verification))
    }

    fn agent_id_in(&self, state: &WorkflowState) -> Option<String> {
        match &self.extractor {
            Some(extract) => extract(state).filter(|id| !id.trim().is_empty()),
            None => extract_agent_id(state),
        }
    }

    fn saved_agent_id(&self, checkpoint: &WorkflowState, run_config: &WorkflowState) -> Option<String> {
        if self.extractor.is_some() {
            return self.agent_id_in(checkpoint);
        }

        let from_state = match checkpoint.get("state") {
            Some(Value::Object(state)) => extract_agent_id(state),
            _ => None,
        };
        from_state.or_else(|| {
            let configurable = run_config.get("configurable")?.as_object()?;
            ["agent_id", "user_id"].iter().find_map(|key| match configurable.get(*key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
        })
    }

    async fn verify_node(
        &self,
        node: &str,
        agent_id: &str,
        state: &WorkflowState,
    ) -> Result<CheckpointVerification, CheckpointError> {
        let rule = self.config.rule_for(node);
        let policy = rule
            .and_then(|r| r.policy.as_deref())
            .unwrap_or(&self.default_policy);

        let mut context = Context::new();
        context.insert("node_name".to_string(), json!(node));

        let verification = self
            .verify_checkpoint(policy, agent_id, &format!("node_{}", node), state, &context)
            .await?;

        let required = rule.map(|r| r.required_capabilities.as_slice()).unwrap_or_default();
        for capability in required {
            let held = verification
                .passport
                .as_ref()
                .is_some_and(|p| p.has_capability(capability));
            if !held {
                warn!(node = %node, agent_id = %agent_id, capability = %capability, "required capability not held");
                return Err(CheckpointError::CapabilityMissing {
                    agent_id: agent_id.to_string(),
                    node: node.to_string(),
                    capability: capability.clone(),
                });
            }
        }

        Ok(verification)
    }
}

/// Agent id from the top level of `state`, then from `state.config`.
///
/// String and numeric values are accepted; empty strings are skipped.
pub fn extract_agent_id(state: &WorkflowState) -> Option<String> {
    let from = |map: &WorkflowState| {
        AGENT_ID_KEYS.iter().find_map(|key| match map.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    };

    from(state).or_else(|| match state.get("config") {
        Some(Value::Object(config)) => from(config),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use aport_contracts::error::TransportError;
    use aport_core::TransportResponse;

    use super::*;
    use crate::testing::{allow_body, allow_with_passport, deny_body, stub_client};

    fn state(value: Value) -> WorkflowState {
        value.as_object().cloned().unwrap()
    }

    fn sent_context(request: &aport_core::TransportRequest) -> Value {
        request.body.as_ref().unwrap()["context"]["context"].clone()
    }

    // ── Agent id extraction ──────────────────────────────────────────────────

    #[test]
    fn agent_id_keys_in_priority_order() {
        assert_eq!(
            extract_agent_id(&state(json!({ "userId": "u", "agentId": "a" }))).as_deref(),
            Some("a")
        );
        assert_eq!(
            extract_agent_id(&state(json!({ "config": { "user_id": "cfg_user" } }))).as_deref(),
            Some("cfg_user")
        );
        assert_eq!(extract_agent_id(&state(json!({ "agent": 7 }))).as_deref(), Some("7"));
        assert_eq!(extract_agent_id(&state(json!({ "agent_id": "", "other": 1 }))), None);
    }

    // ── verify_checkpoint / verify_state_transition ──────────────────────────

    #[tokio::test]
    async fn checkpoint_context_has_sorted_keys_and_timestamp() {
        let (client, seen) = stub_client(|_| Ok(TransportResponse::json(200, &allow_body("dec_c1"))));
        let guard = CheckpointGuard::new(client);

        let verification = guard
            .verify_checkpoint(
                DEFAULT_WORKFLOW_POLICY,
                "agt_1",
                "cp_1",
                &state(json!({ "b": 1, "a": 2 })),
                &json!({ "step": "review" }).as_object().cloned().unwrap(),
            )
            .await
            .unwrap();

        assert!(verification.verified);
        assert_eq!(verification.decision_id, "dec_c1");
        assert_eq!(verification.expires_in_seconds, 60);

        let ctx = sent_context(&seen.lock().unwrap()[0]);
        assert_eq!(ctx["checkpoint_id"], "cp_1");
        assert_eq!(ctx["state_keys"], json!(["a", "b"]));
        assert_eq!(ctx["step"], "review");
        let ts = ctx["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok(), "timestamp {} is not RFC 3339", ts);
    }

    #[tokio::test]
    async fn denied_checkpoint_carries_reasons_and_decision() {
        let (client, _) = stub_client(|_| {
            Ok(TransportResponse::json(200, &deny_body("dec_d", "MOCK_DENIAL", "Agent denied")))
        });
        let guard = CheckpointGuard::new(client);

        match guard
            .verify_checkpoint(DEFAULT_WORKFLOW_POLICY, "agt_denied", "cp", &WorkflowState::new(), &Context::new())
            .await
        {
            Err(CheckpointError::Denied { agent_id, checkpoint_id, reasons, decision_id }) => {
                assert_eq!(agent_id, "agt_denied");
                assert_eq!(checkpoint_id, "cp");
                assert_eq!(reasons, "[MOCK_DENIAL] Agent denied");
                assert_eq!(decision_id, "dec_d");
            }
            other => panic!("expected Denied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn transition_builds_checkpoint_id_and_context() {
        let (client, seen) = stub_client(|_| Ok(TransportResponse::json(200, &allow_body("dec_t"))));
        let guard = CheckpointGuard::new(client);
        let data = state(json!({ "k": "v" }));

        let verification = guard
            .verify_state_transition(DEFAULT_WORKFLOW_POLICY, "agt_1", "draft", "review", &data, &Context::new())
            .await
            .unwrap();
        assert_eq!(verification.checkpoint_id, "transition_draft_to_review");

        let ctx = sent_context(&seen.lock().unwrap()[0]);
        assert_eq!(ctx["transition"], "draft -> review");
        assert_eq!(ctx["from_state"], "draft");
        assert_eq!(ctx["to_state"], "review");
        assert_eq!(ctx["state_data_size"], json!(r#"{"k":"v"}"#.len()));
        assert_eq!(ctx["checkpoint_id"], "transition_draft_to_review");
    }

    // ── guard_node ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn guard_node_uses_rule_policy_and_records_verification() {
        let (client, seen) = stub_client(|_| {
            Ok(TransportResponse::json(
                200,
                &allow_with_passport("dec_n", json!({ "agent_id": "agt_1", "capabilities": ["payments.refund"] })),
            ))
        });
        let mut guard = CheckpointGuard::new(client);
        guard.add_rule(CheckpointRule::new("issue_refund").with_policy("payments.refund.v1").requiring("payments.refund"));

        let mut s = state(json!({ "agent_id": "agt_1" }));
        let outcome = guard.guard_node("issue_refund", &mut s).await.unwrap();
        assert!(matches!(outcome, NodeGuard::Verified(_)));
        assert_eq!(s[STATE_VERIFICATION]["decision_id"], "dec_n");
        assert_eq!(s[STATE_VERIFICATION]["checkpoint_id"], "node_issue_refund");

        let sent = seen.lock().unwrap();
        assert_eq!(sent[0].path, "/api/verify/policy/payments.refund.v1");
        assert_eq!(sent_context(&sent[0])["node_name"], "issue_refund");
    }

    #[tokio::test]
    async fn unmatched_node_uses_default_policy() {
        let (client, seen) = stub_client(|_| Ok(TransportResponse::json(200, &allow_body("dec_x"))));
        let guard = CheckpointGuard::new(client).with_default_policy("custom.flow.v2");

        guard
            .guard_node("summarize", &mut state(json!({ "agentId": "agt_1" })))
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap()[0].path, "/api/verify/policy/custom.flow.v2");
    }

    #[tokio::test]
    async fn missing_capability_fails_strict_guard() {
        let (client, _) = stub_client(|_| {
            Ok(TransportResponse::json(200, &allow_with_passport("dec_m", json!({ "agent_id": "agt_1" }))))
        });
        let config = CheckpointConfig::from_toml_str(
            r#"
            [[rules]]
            node = "*"
            required_capabilities = ["data.export"]
        "#,
        )
        .unwrap();
        let guard = CheckpointGuard::new(client).with_config(config);

        match guard.guard_node("export", &mut state(json!({ "agent_id": "agt_1" }))).await {
            Err(CheckpointError::CapabilityMissing { capability, node, .. }) => {
                assert_eq!(capability, "data.export");
                assert_eq!(node, "export");
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_agent_id_strict_vs_lenient() {
        let (client, seen) = stub_client(|_| panic!("no request expected"));
        let strict = CheckpointGuard::new(client.clone());
        let lenient = CheckpointGuard::new(client).strict(false);

        assert!(matches!(
            strict.guard_node("n", &mut WorkflowState::new()).await,
            Err(CheckpointError::MissingAgentId { .. })
        ));
        assert_eq!(lenient.guard_node("n", &mut WorkflowState::new()).await.unwrap(), NodeGuard::Skipped);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lenient_guard_writes_error_into_state() {
        let (client, _) = stub_client(|_| {
            Err(TransportError::Network {
                reason: "connection reset".to_string(),
            })
        });
        let guard = CheckpointGuard::new(client).strict(false);
        let mut s = state(json!({ "agent_id": "agt_1" }));

        match guard.guard_node("n", &mut s).await.unwrap() {
            NodeGuard::Unverified { error } => assert!(error.contains("connection reset")),
            other => panic!("expected Unverified, got {:?}", other),
        }
        assert!(s[STATE_VERIFICATION_ERROR].as_str().unwrap().contains("connection reset"));
        assert!(!s.contains_key(STATE_VERIFICATION));
    }

    #[tokio::test]
    async fn custom_extractor_replaces_state_lookup() {
        let (client, seen) = stub_client(|_| Ok(TransportResponse::json(200, &allow_body("dec_e"))));
        let guard = CheckpointGuard::new(client).with_agent_id_extractor(|state| {
            state
                .get("session")
                .and_then(|s| s.get("principal"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        let mut s = state(json!({ "agent_id": "ignored", "session": { "principal": "agt_session" } }));
        guard.guard_node("n", &mut s).await.unwrap();
        assert_eq!(seen.lock().unwrap()[0].body.as_ref().unwrap()["agent_id"], "agt_session");

        assert!(matches!(
            guard.guard_node("n", &mut state(json!({ "agent_id": "agt_1" }))).await,
            Err(CheckpointError::MissingAgentId { .. })
        ));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    // ── verify_checkpoint_save ───────────────────────────────────────────────

    #[tokio::test]
    async fn checkpoint_save_reads_agent_from_saved_state() {
        let (client, seen) = stub_client(|_| Ok(TransportResponse::json(200, &allow_body("dec_s"))));
        let guard = CheckpointGuard::new(client);
        let checkpoint = state(json!({ "state": { "agentId": "agt_saver" }, "step": 3 }));
        let run_config = state(json!({ "run_id": "run_42" }));

        let verification = guard
            .verify_checkpoint_save(&checkpoint, &run_config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(verification.checkpoint_id, "save_run_42");
        assert_eq!(verification.agent_id, "agt_saver");

        let sent = seen.lock().unwrap();
        assert_eq!(sent[0].path, format!("/api/verify/policy/{}", DEFAULT_WORKFLOW_POLICY));
        let ctx = sent_context(&sent[0]);
        assert_eq!(ctx["operation"], "save_checkpoint");
        assert_eq!(ctx["state_keys"], json!(["state", "step"]));
    }

    #[tokio::test]
    async fn checkpoint_save_falls_back_to_run_config() {
        let (client, seen) = stub_client(|_| Ok(TransportResponse::json(200, &allow_body("dec_s2"))));
        let guard = CheckpointGuard::new(client);
        let run_config = state(json!({ "configurable": { "user_id": "usr_7" } }));

        let verification = guard
            .verify_checkpoint_save(&state(json!({ "state": {} })), &run_config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(verification.checkpoint_id, "save_unknown");
        assert_eq!(seen.lock().unwrap()[0].body.as_ref().unwrap()["agent_id"], "usr_7");
    }

    #[tokio::test]
    async fn denied_checkpoint_save_is_an_error() {
        let (client, _) = stub_client(|_| {
            Ok(TransportResponse::json(200, &deny_body("dec_sd", "MOCK_DENIAL", "Agent denied")))
        });
        let guard = CheckpointGuard::new(client);
        let checkpoint = state(json!({ "state": { "agent_id": "agt_denied" } }));

        match guard.verify_checkpoint_save(&checkpoint, &state(json!({ "run_id": "r1" }))).await {
            Err(CheckpointError::Denied { checkpoint_id, .. }) => assert_eq!(checkpoint_id, "save_r1"),
            other => panic!("expected Denied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn lenient_or_anonymous_saves_are_not_verified() {
        let (client, seen) = stub_client(|_| panic!("no request expected"));
        let strict = CheckpointGuard::new(client.clone());
        let lenient = CheckpointGuard::new(client).strict(false);
        let with_agent = state(json!({ "state": { "agent_id": "agt_1" } }));

        assert_eq!(lenient.verify_checkpoint_save(&with_agent, &WorkflowState::new()).await.unwrap(), None);
        assert_eq!(
            strict
                .verify_checkpoint_save(&state(json!({ "step": 1 })), &WorkflowState::new())
                .await
                .unwrap(),
            None
        );
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn strict_guard_surfaces_client_errors() {
        let (client, _) = stub_client(|_| Ok(TransportResponse::new(500, "down")));
        let guard = CheckpointGuard::new(client);

        assert!(matches!(
            guard.guard_node("n", &mut state(json!({ "agent_id": "agt_1" }))).await,
            Err(CheckpointError::Client(AportError::ServiceError { status: 500, .. }))
        ));
    }
}
