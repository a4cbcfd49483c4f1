//! # aport-contracts
//!
//! Shared types, wire payloads, and error contracts for the APort
//! verification client.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod decision;
pub mod error;
pub mod passport;
pub mod policy_pack;
pub mod request;

#[cfg(test)]
mod tests {
    use super::*;
    use decision::{Decision, Reason, VerificationResult};
    use error::{AportError, ErrorKind, TransportError};
    use passport::{LimitValue, Passport, PassportStatus};
    use policy_pack::PolicyPackDetail;

    fn deny_decision(reasons: Vec<Reason>) -> Decision {
        Decision {
            allow: false,
            decision_id: "dec_1".to_string(),
            expires_in_seconds: 0,
            reasons,
            assurance_level: None,
            created_at: None,
        }
    }

    // ── Decision ─────────────────────────────────────────────────────────────

    #[test]
    fn denial_summary_without_reasons_is_unknown() {
        assert_eq!(deny_decision(vec![]).denial_summary(), "Unknown");
    }

    #[test]
    fn denial_summary_joins_reasons_with_codes() {
        let decision = deny_decision(vec![
            Reason::with_code("LIMIT_EXCEEDED", "refund over per-tx cap"),
            Reason::new("region not allowed"),
        ]);
        assert_eq!(
            decision.denial_summary(),
            "[LIMIT_EXCEEDED] refund over per-tx cap; region not allowed"
        );
        assert!(decision.has_reason_code("LIMIT_EXCEEDED"));
        assert!(!decision.has_reason_code("OTHER"));
    }

    #[test]
    fn verification_result_mirrors_allow() {
        let denied = VerificationResult::new(deny_decision(vec![Reason::new("no")]), None);
        assert!(!denied.verified);

        let mut allowed = deny_decision(vec![]);
        allowed.allow = true;
        assert!(VerificationResult::new(allowed, None).verified);
    }

    // ── Passport serde ───────────────────────────────────────────────────────

    #[test]
    fn passport_accepts_bare_and_parameterized_capabilities() {
        let passport: Passport = serde_json::from_value(serde_json::json!({
            "agentId": "ap_128094d3",
            "name": "Refund Bot",
            "capabilities": [
                "payments.refund",
                { "id": "data.export", "params": { "max_rows": 1000 } }
            ],
            "limits": {
                "refund_amount_max_per_tx": 5000,
                "refund_amount_daily_cap": 25000.5,
                "allow_pii": false,
                "period": "1h"
            },
            "regions": ["US", "CA"],
            "status": "active"
        }))
        .unwrap();

        assert_eq!(passport.agent_id, "ap_128094d3");
        assert!(passport.has_capability("payments.refund"));
        assert!(passport.has_capability("data.export"));
        assert_eq!(passport.capabilities[1].params["max_rows"], 1000);
        assert_eq!(passport.limit("refund_amount_max_per_tx"), Some(&LimitValue::Integer(5000)));
        assert_eq!(passport.limit("refund_amount_daily_cap").and_then(|l| l.as_f64()), Some(25000.5));
        assert_eq!(passport.limit("allow_pii"), Some(&LimitValue::Bool(false)));
        assert_eq!(passport.limit("period"), Some(&LimitValue::Text("1h".to_string())));
        assert!(passport.status.is_active());
    }

    #[test]
    fn passport_status_preserves_unrecognized_values() {
        let passport: Passport = serde_json::from_value(serde_json::json!({
            "agent_id": "agt_x",
            "status": "pending_review"
        }))
        .unwrap();

        assert_eq!(passport.status, PassportStatus::Other("pending_review".to_string()));
        assert!(!passport.status.is_active());

        let json = serde_json::to_value(&passport).unwrap();
        assert_eq!(json["status"], "pending_review");
    }

    #[test]
    fn passport_defaults_to_active_when_status_missing() {
        let passport: Passport =
            serde_json::from_value(serde_json::json!({ "agent_id": "agt_y" })).unwrap();
        assert_eq!(passport.status, PassportStatus::Active);
        assert!(passport.capabilities.is_empty());
    }

    #[test]
    fn passport_null_fields_fall_back_to_defaults() {
        let passport: Passport = serde_json::from_value(serde_json::json!({
            "agent_id": "agt_1",
            "name": null,
            "capabilities": null,
            "limits": null,
            "regions": null,
            "status": null,
            "metadata": null
        }))
        .unwrap();
        assert_eq!(passport, Passport::new("agt_1", ""));
    }

    // ── Policy packs ─────────────────────────────────────────────────────────

    #[test]
    fn policy_pack_detail_flattens_summary() {
        let detail: PolicyPackDetail = serde_json::from_value(serde_json::json!({
            "id": "payments.refund.v1",
            "name": "Refunds",
            "requires_capabilities": ["payments.refund"],
            "min_assurance": "L2",
            "required_context": ["amount", "currency"]
        }))
        .unwrap();

        assert_eq!(detail.summary.id, "payments.refund.v1");
        assert_eq!(detail.summary.name, "Refunds");
        assert_eq!(detail.requires_capabilities, vec!["payments.refund"]);
        assert_eq!(detail.min_assurance.as_deref(), Some("L2"));
        assert!(detail.limits.is_empty());
    }

    // ── Wire payloads ────────────────────────────────────────────────────────

    #[test]
    fn verify_payload_serializes_nested_context() {
        let mut ctx = request::Context::new();
        ctx.insert("amount".to_string(), serde_json::json!(50));

        let payload = request::VerifyPayload {
            context: request::VerifyEnvelope {
                agent_id: "agt_1".to_string(),
                policy_id: "payments.refund.v1".to_string(),
                context: ctx,
            },
        };

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({
                "context": {
                    "agent_id": "agt_1",
                    "policy_id": "payments.refund.v1",
                    "context": { "amount": 50 }
                }
            })
        );
    }

    // ── AportError ───────────────────────────────────────────────────────────

    #[test]
    fn only_network_and_service_errors_are_retryable() {
        let retryable = [
            AportError::NetworkFailure { reason: "reset".to_string() },
            AportError::ServiceError { status: 503, message: "down".to_string() },
        ];
        let not_retryable = [
            AportError::AuthError { status: 403, message: "no".to_string() },
            AportError::MalformedResponse { reason: "bad".to_string() },
            AportError::NotFound { message: "gone".to_string() },
            AportError::Validation { reason: "empty".to_string() },
            AportError::Cancelled,
        ];

        assert!(retryable.iter().all(AportError::is_retryable));
        assert!(!not_retryable.iter().any(AportError::is_retryable));
    }

    #[test]
    fn error_kind_and_status() {
        let err = AportError::AuthError {
            status: 403,
            message: "Agent not found".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::AuthError);
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("Agent not found"));

        assert_eq!(AportError::Cancelled.kind().as_str(), "cancelled");
        assert_eq!(AportError::Cancelled.status(), None);
    }

    #[test]
    fn transport_timeout_becomes_network_failure() {
        let err: AportError = TransportError::Timeout {
            after: std::time::Duration::from_millis(250),
        }
        .into();

        match err {
            AportError::NetworkFailure { reason } => assert!(reason.contains("250ms")),
            other => panic!("expected NetworkFailure, got {:?}", other),
        }
    }

    #[test]
    fn auth_required_display_names_operation() {
        let err = AportError::AuthRequired {
            operation: "create_passport".to_string(),
        };
        assert!(err.to_string().contains("create_passport"));
        assert!(err.to_string().contains("API key"));
    }
}
