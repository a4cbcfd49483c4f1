//! Scenario 1: Refund check
//!
//! The hello-world integration: before issuing a refund, verify the refund
//! bot against `payments.refund.v1` and act on the decision.
//!
//!   1. Refund bot (active passport) → allowed, passport attached
//!   2. An agent flagged as denied → denied with `MOCK_DENIAL`
//!   3. PR merger (suspended passport) → denied with `PASSPORT_SUSPENDED`

use std::sync::Arc;

use serde_json::json;

use aport_contracts::{decision::VerificationResult, request::Context};

use crate::mock_data::{PR_MERGER, REFUND_BOT, REFUND_POLICY};
use crate::scenarios::{expect, mock_client, ScenarioResult};
use crate::transport::MockTransport;

fn refund_context() -> Context {
    let mut context = Context::new();
    context.insert("amount".to_string(), json!(50));
    context.insert("currency".to_string(), json!("USD"));
    context.insert("demo".to_string(), json!(true));
    context
}

pub fn print_result(agent_id: &str, policy: &str, result: &VerificationResult) {
    let decision = &result.decision;
    println!("  Agent ID:     {}", agent_id);
    println!("  Policy:       {}", policy);
    println!("  Decision ID:  {}", decision.decision_id);
    println!("  Status:       {}", if decision.allow { "ALLOWED" } else { "DENIED" });
    println!("  Expires in:   {} seconds", decision.expires_in_seconds);
    if !decision.reasons.is_empty() {
        println!("  Reasons:");
        for reason in &decision.reasons {
            match &reason.code {
                Some(code) => println!("    - [{}] {}", code, reason.message),
                None => println!("    - {}", reason.message),
            }
        }
    }
    if let Some(passport) = &result.passport {
        let capabilities: Vec<&str> = passport.capabilities.iter().map(|c| c.id.as_str()).collect();
        println!("  Passport:     {} [{}] ({})", passport.name, passport.status, capabilities.join(", "));
    }
}

/// Run Scenario 1: Refund check.
pub async fn run_scenario() -> ScenarioResult {
    println!("=== Scenario 1: Refund check ===");
    println!();

    let mock = Arc::new(MockTransport::new());
    let client = mock_client(&mock, false)?;
    let context = refund_context();

    // ── 1. Active refund bot ─────────────────────────────────────────────────

    println!("  Case 1: refund bot, $50 USD");
    let allowed = client.verify(REFUND_POLICY, REFUND_BOT, &context).await?;
    print_result(REFUND_BOT, REFUND_POLICY, &allowed);
    expect(allowed.verified, "refund bot should be allowed")?;
    expect(allowed.passport.is_some(), "allow should carry the passport")?;
    println!("  -> refund issued");
    println!();

    // ── 2. Denied agent ──────────────────────────────────────────────────────

    let denied_agent = "agt_denied_refunds";
    println!("  Case 2: {}", denied_agent);
    let denied = client.verify(REFUND_POLICY, denied_agent, &context).await?;
    print_result(denied_agent, REFUND_POLICY, &denied);
    expect(!denied.verified, "flagged agent should be denied")?;
    expect(denied.decision.has_reason_code("MOCK_DENIAL"), "denial should cite MOCK_DENIAL")?;
    println!("  -> refund blocked: {}", denied.decision.denial_summary());
    println!();

    // ── 3. Suspended passport ────────────────────────────────────────────────

    println!("  Case 3: suspended PR merger tries a refund");
    let suspended = client.verify(REFUND_POLICY, PR_MERGER, &context).await?;
    print_result(PR_MERGER, REFUND_POLICY, &suspended);
    expect(
        suspended.decision.has_reason_code("PASSPORT_SUSPENDED"),
        "suspended passport should be denied",
    )?;
    println!("  -> refund blocked: {}", suspended.decision.denial_summary());
    println!();

    expect(
        allowed.decision.decision_id != denied.decision.decision_id,
        "decision ids must be unique",
    )?;

    println!("  Service calls: {}", mock.call_count());
    println!("  Scenario 1 complete.");
    println!();
    Ok(())
}
