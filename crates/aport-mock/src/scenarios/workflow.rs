//! Scenario 2: Checkpoint-guarded workflow
//!
//! A three-node refund workflow (`intake` → `issue_refund` → `notify`) where
//! every node is verified by a `CheckpointGuard` before it runs. Node rules
//! come from `rules/workflow.toml`.
//!
//!   1. Refund bot runs the whole workflow; each node is verified, then the
//!      finished state is verified before it is saved
//!   2. State transition `intake → refund` verified on its own
//!   3. Data exporter reaches `issue_refund` without `payments.refund` →
//!      strict guard stops the workflow
//!   4. Lenient guard with a denied agent: the error lands in the state and
//!      the workflow keeps going

use std::sync::Arc;

use serde_json::{json, Value};

use aport_contracts::request::Context;
use aport_guard::{
    checkpoint::{STATE_VERIFICATION, STATE_VERIFICATION_ERROR},
    CheckpointConfig, CheckpointError, CheckpointGuard, NodeGuard, WorkflowState,
};

use crate::mock_data::{DATA_EXPORTER, REFUND_BOT, WORKFLOW_POLICY};
use crate::scenarios::{expect, mock_client, ScenarioError, ScenarioResult};
use crate::transport::MockTransport;

/// Embedded node rules for the workflow scenario.
const WORKFLOW_RULES: &str = include_str!("../../rules/workflow.toml");

pub const NODES: [&str; 3] = ["intake", "issue_refund", "notify"];

fn initial_state(agent_id: &str) -> WorkflowState {
    let mut state = WorkflowState::new();
    state.insert("agent_id".to_string(), json!(agent_id));
    state.insert("order_id".to_string(), json!("ord_4411"));
    state.insert("amount".to_string(), json!(50));
    state
}

/// Run the nodes in order, stopping at the first guard error.
async fn run_workflow(guard: &CheckpointGuard, state: &mut WorkflowState) -> Result<Vec<String>, CheckpointError> {
    let mut completed = Vec::new();
    for node in NODES {
        match guard.guard_node(node, state).await? {
            NodeGuard::Verified(v) => println!("    {:<13} verified ({} via {})", node, v.decision_id, v.policy),
            NodeGuard::Skipped => println!("    {:<13} skipped (no agent id)", node),
            NodeGuard::Unverified { error } => println!("    {:<13} UNVERIFIED: {}", node, error),
        }
        state.insert("last_node".to_string(), json!(node));
        completed.push(node.to_string());
    }
    Ok(completed)
}

/// Run Scenario 2: Checkpoint-guarded workflow.
pub async fn run_scenario() -> ScenarioResult {
    println!("=== Scenario 2: Checkpoint-guarded workflow ===");
    println!();

    let mock = Arc::new(MockTransport::new());
    let client = mock_client(&mock, false)?;
    let rules = CheckpointConfig::from_toml_str(WORKFLOW_RULES)?;
    let guard = CheckpointGuard::new(client.clone()).with_config(rules.clone());

    // ── 1. Happy path ────────────────────────────────────────────────────────

    println!("  Case 1: refund bot runs {}", NODES.join(" -> "));
    let mut state = initial_state(REFUND_BOT);
    let completed = run_workflow(&guard, &mut state).await?;
    expect(completed.len() == NODES.len(), "every node should run")?;
    expect(state.contains_key(STATE_VERIFICATION), "verification should be recorded in state")?;

    let mut checkpoint = WorkflowState::new();
    checkpoint.insert("state".to_string(), Value::Object(state.clone()));
    let mut run_config = WorkflowState::new();
    run_config.insert("run_id".to_string(), json!("run_001"));
    let saved = guard.verify_checkpoint_save(&checkpoint, &run_config).await?;
    match &saved {
        Some(v) => println!("    checkpoint save verified ({} at {})", v.decision_id, v.checkpoint_id),
        None => println!("    checkpoint save not verified"),
    }
    expect(
        saved.is_some_and(|v| v.checkpoint_id == "save_run_001"),
        "strict guard should verify the checkpoint save",
    )?;
    println!();

    // ── 2. Explicit state transition ─────────────────────────────────────────

    println!("  Case 2: transition intake -> refund");
    let transition = guard
        .verify_state_transition(WORKFLOW_POLICY, REFUND_BOT, "intake", "refund", &state, &Context::new())
        .await?;
    println!("    checkpoint {} verified ({})", transition.checkpoint_id, transition.decision_id);
    expect(
        transition.checkpoint_id == "transition_intake_to_refund",
        "transition checkpoint id",
    )?;
    println!();

    // ── 3. Missing capability, strict ────────────────────────────────────────

    println!("  Case 3: data exporter attempts the refund workflow (strict)");
    let mut state = initial_state(DATA_EXPORTER);
    match run_workflow(&guard, &mut state).await {
        Err(CheckpointError::CapabilityMissing { node, capability, .. }) => {
            println!("    stopped at {}: missing capability '{}'", node, capability);
            expect(node == "issue_refund", "workflow should stop at issue_refund")?;
        }
        Err(other) => return Err(other.into()),
        Ok(_) => return Err(ScenarioError::Unexpected("exporter should not issue refunds".to_string())),
    }
    println!();

    // ── 4. Denied agent, lenient ─────────────────────────────────────────────

    println!("  Case 4: denied agent under a lenient guard");
    let lenient = CheckpointGuard::new(client).with_config(rules).strict(false);
    let mut state = initial_state("agt_denied_workflow");
    let completed = run_workflow(&lenient, &mut state).await?;
    expect(completed.len() == NODES.len(), "lenient guard should not stop the workflow")?;
    let recorded = state
        .get(STATE_VERIFICATION_ERROR)
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    println!("    state[{}] = {}", STATE_VERIFICATION_ERROR, recorded);
    expect(recorded.contains("MOCK_DENIAL"), "denial should be recorded in state")?;
    println!();

    println!("  Service calls: {}", mock.call_count());
    println!("  Scenario 2 complete.");
    println!();
    Ok(())
}
