//! Framework-neutral request guard.
//!
//! `PolicyGuard` runs the verify-then-proceed contract that server
//! middleware applies to every protected route:
//!
//! 1. Resolve the agent id. None → 400.
//! 2. Build the request context and merge the guard's static context over it.
//! 3. Verify. `allow == false` → 403.
//! 4. Client error → 500 in strict mode, unverified pass-through otherwise.
//! 5. Proceed with a `GuardContext`.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use aport_contracts::{
    decision::Decision,
    passport::Passport,
    request::Context,
};
use aport_core::VerificationClient;

use crate::resolver::{AgentIdResolver, InboundRequest};

/// What a handler receives once the guard let a request through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardContext {
    pub verified: bool,
    pub passport: Option<Passport>,
    pub policy: String,
    pub agent_id: String,
    pub decision: Decision,
}

/// A refusal the adapter turns into an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub status: u16,
    pub error: String,
    pub message: String,
    pub details: Option<Value>,
}

impl Rejection {
    /// JSON body: `{"error", "message", "details"?}`.
    pub fn body(&self) -> Value {
        let mut body = json!({
            "error": self.error,
            "message": self.message,
        });
        if let Some(details) = &self.details {
            body["details"] = details.clone();
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    Proceed(GuardContext),
    /// Non-strict mode only: the client failed, the request goes on anyway.
    ProceedUnverified { error: String },
    Reject(Rejection),
}

impl GuardOutcome {
    pub fn is_proceed(&self) -> bool {
        !matches!(self, Self::Reject(_))
    }
}

/// Guards one policy.
#[derive(Debug, Clone)]
pub struct PolicyGuard {
    client: VerificationClient,
    policy: String,
    strict: bool,
    context: Context,
    resolver: AgentIdResolver,
}

impl PolicyGuard {
    /// Strict guard for `policy` with the default resolver.
    pub fn new(client: VerificationClient, policy: impl Into<String>) -> Self {
        Self {
            client,
            policy: policy.into(),
            strict: true,
            context: Context::new(),
            resolver: AgentIdResolver::default(),
        }
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Static context merged into every verify call. Its keys win over the
    /// per-request ones.
    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: AgentIdResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    pub async fn check(&self, request: &InboundRequest) -> GuardOutcome {
        let Some(agent_id) = self.resolver.resolve(request) else {
            warn!(policy = %self.policy, path = %request.path, "request carries no agent id");
            return GuardOutcome::Reject(Rejection {
                status: 400,
                error: "Agent ID required".to_string(),
                message: "Agent ID must be provided in headers, query, or body".to_string(),
                details: None,
            });
        };

        let context = self.request_context(request);
        debug!(policy = %self.policy, agent_id = %agent_id, path = %request.path, "guarding request");

        match self.client.verify(&self.policy, &agent_id, &context).await {
            Ok(result) if result.verified => {
                info!(
                    policy = %self.policy,
                    agent_id = %agent_id,
                    decision_id = %result.decision.decision_id,
                    "request verified"
                );
                GuardOutcome::Proceed(GuardContext {
                    verified: true,
                    passport: result.passport,
                    policy: self.policy.clone(),
                    agent_id,
                    decision: result.decision,
                })
            }
            Ok(result) => {
                let decision = result.decision;
                warn!(
                    policy = %self.policy,
                    agent_id = %agent_id,
                    decision_id = %decision.decision_id,
                    "request denied"
                );
                GuardOutcome::Reject(Rejection {
                    status: 403,
                    error: "Verification failed".to_string(),
                    message: decision.denial_summary(),
                    details: Some(json!({
                        "reasons": decision.reasons,
                        "decision_id": decision.decision_id,
                    })),
                })
            }
            Err(e) if self.strict => {
                warn!(policy = %self.policy, agent_id = %agent_id, kind = %e.kind(), error = %e, "verification error");
                GuardOutcome::Reject(Rejection {
                    status: 500,
                    error: "Verification error".to_string(),
                    message: "Internal verification error".to_string(),
                    details: None,
                })
            }
            Err(e) => {
                warn!(policy = %self.policy, agent_id = %agent_id, error = %e, "verification error; proceeding unverified");
                GuardOutcome::ProceedUnverified {
                    error: e.to_string(),
                }
            }
        }
    }

    fn request_context(&self, request: &InboundRequest) -> Context {
        let mut context = Context::new();
        context.insert("method".to_string(), json!(request.method));
        context.insert("path".to_string(), json!(request.path));
        context.insert("user_agent".to_string(), json!(request.user_agent()));
        context.insert("ip".to_string(), json!(request.remote_ip));
        for (key, value) in &self.context {
            context.insert(key.clone(), value.clone());
        }
        context
    }
}
