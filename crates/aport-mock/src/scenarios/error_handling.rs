//! Scenario 3: Error handling
//!
//! How an integration tells denials apart from failures, and what each guard
//! mode does when the service is unreachable.
//!
//!   1. Two 503s, then success: `with_retry` recovers on the third attempt
//!   2. Service down: strict `PolicyGuard` → 500, lenient → proceeds unverified
//!   3. No agent id → 400; denied agent → 403 (a denial is never retried)
//!   4. Suspend without an API key → `AuthRequired`, nothing sent

use std::sync::Arc;
use std::time::Duration;

use aport_contracts::{error::AportError, request::Context};
use aport_core::{with_retry, RetryPolicy};
use aport_guard::{GuardOutcome, InboundRequest, PolicyGuard};

use crate::mock_data::{REFUND_BOT, REFUND_POLICY};
use crate::scenarios::{expect, mock_client, ScenarioError, ScenarioResult};
use crate::transport::{Fault, MockTransport};

fn demo_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        max_jitter: Duration::from_millis(10),
    }
}

fn describe(outcome: &GuardOutcome) -> String {
    match outcome {
        GuardOutcome::Proceed(ctx) => format!("proceed (decision {})", ctx.decision.decision_id),
        GuardOutcome::ProceedUnverified { error } => format!("proceed UNVERIFIED ({})", error),
        GuardOutcome::Reject(r) => format!("reject {} {}", r.status, r.body()),
    }
}

fn refund_request(agent_id: Option<&str>) -> InboundRequest {
    let request = InboundRequest::new("POST", "/api/refunds").with_remote_ip("203.0.113.9");
    match agent_id {
        Some(id) => request.with_header("X-Agent-ID", id),
        None => request,
    }
}

/// Run Scenario 3: Error handling.
pub async fn run_scenario() -> ScenarioResult {
    println!("=== Scenario 3: Error handling ===");
    println!();

    let mock = Arc::new(MockTransport::new().with_api_key(super::MOCK_ADMIN_KEY));
    let client = mock_client(&mock, false)?;
    let empty = Context::new();

    // ── 1. Retry through transient service errors ────────────────────────────

    println!("  Case 1: service returns 503 twice");
    mock.fail_next(
        2,
        Fault::Status {
            status: 503,
            message: "maintenance window".to_string(),
        },
    );
    let before = mock.call_count();
    let result = with_retry(&demo_retry_policy(), || {
        client.verify(REFUND_POLICY, REFUND_BOT, &empty)
    })
    .await?;
    let attempts = mock.call_count() - before;
    println!("    verified={} after {} attempt(s)", result.verified, attempts);
    expect(result.verified && attempts == 3, "retry should succeed on the third attempt")?;
    println!();

    // ── 2. Service unreachable ───────────────────────────────────────────────

    println!("  Case 2: network down");
    mock.fail_always(Fault::Network {
        reason: "connection refused".to_string(),
    });
    let strict = PolicyGuard::new(client.clone(), REFUND_POLICY);
    let lenient = PolicyGuard::new(client.clone(), REFUND_POLICY).strict(false);

    let strict_outcome = strict.check(&refund_request(Some(REFUND_BOT))).await;
    let lenient_outcome = lenient.check(&refund_request(Some(REFUND_BOT))).await;
    println!("    strict:  {}", describe(&strict_outcome));
    println!("    lenient: {}", describe(&lenient_outcome));
    expect(
        matches!(&strict_outcome, GuardOutcome::Reject(r) if r.status == 500),
        "strict guard should reject with 500",
    )?;
    expect(
        matches!(lenient_outcome, GuardOutcome::ProceedUnverified { .. }),
        "lenient guard should proceed unverified",
    )?;
    mock.clear_faults();
    println!();

    // ── 3. Client-side and policy rejections ─────────────────────────────────

    println!("  Case 3: missing agent id, then a denied agent");
    let missing = strict.check(&refund_request(None)).await;
    println!("    no agent id: {}", describe(&missing));
    expect(
        matches!(&missing, GuardOutcome::Reject(r) if r.status == 400),
        "missing agent id should be 400",
    )?;

    let before = mock.call_count();
    let denied = with_retry(&demo_retry_policy(), || {
        client.verify(REFUND_POLICY, "agt_denied_fraud", &empty)
    })
    .await?;
    println!(
        "    denied agent: verified={} ({}), {} call(s)",
        denied.verified,
        denied.decision.denial_summary(),
        mock.call_count() - before
    );
    expect(!denied.verified && mock.call_count() - before == 1, "denials are not retried")?;

    let rejected = strict.check(&refund_request(Some("agt_denied_fraud"))).await;
    println!("    guard:        {}", describe(&rejected));
    expect(
        matches!(&rejected, GuardOutcome::Reject(r) if r.status == 403),
        "denied agent should be 403",
    )?;
    println!();

    // ── 4. Credential required ───────────────────────────────────────────────

    println!("  Case 4: suspend without an API key");
    let before = mock.call_count();
    match client.suspend_passport(REFUND_BOT, "demo").await {
        Err(e @ AportError::AuthRequired { .. }) => {
            println!("    error [{}]: {}", e.kind(), e);
            expect(mock.call_count() == before, "no request should be sent")?;
        }
        Err(other) => return Err(other.into()),
        Ok(_) => return Err(ScenarioError::Unexpected("suspend without a key succeeded".to_string())),
    }
    println!();

    println!("  Service calls: {}", mock.call_count());
    println!("  Scenario 3 complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn error_handling_scenario_runs() {
        super::run_scenario().await.unwrap();
    }
}
