//! In-process stand-in for the APort verification service.
//!
//! `MockTransport` implements `Transport` and answers every endpoint the
//! client calls from an in-memory registry. No sockets are opened. Decision
//! rules:
//!
//! - agent id contains `denied` (any case) → deny, `MOCK_DENIAL`
//! - agent has a registered passport whose status is not `active` → deny,
//!   `PASSPORT_SUSPENDED`
//! - otherwise → allow
//!
//! Every verify call gets a fresh `dec_<uuid>` decision id.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use aport_contracts::{
    error::TransportError,
    passport::{Passport, PassportStatus},
    policy_pack::PolicyPackDetail,
};
use aport_core::{Method, Transport, TransportRequest, TransportResponse};

use crate::mock_data::{ephemeral_passport, sample_passports, sample_policy_packs, DENIED_MARKER};

pub const DECISION_TTL_SECONDS: u64 = 60;

/// Which response envelope the mock wraps bodies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeShape {
    /// `{"data": {...}}`
    #[default]
    Data,
    /// The object at the top level.
    Bare,
}

/// A failure the mock produces instead of answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Status { status: u16, message: String },
    Network { reason: String },
}

#[derive(Debug, Default)]
struct FaultPlan {
    fault: Option<Fault>,
    /// `None` keeps failing until cleared.
    remaining: Option<usize>,
}

#[derive(Debug)]
struct Registry {
    passports: BTreeMap<String, Passport>,
    packs: Vec<PolicyPackDetail>,
}

#[derive(Debug)]
pub struct MockTransport {
    registry: Mutex<Registry>,
    faults: Mutex<FaultPlan>,
    shape: EnvelopeShape,
    api_key: Option<String>,
    calls: AtomicUsize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// A mock seeded with the sample passports and policy packs, answering in
    /// the `data` envelope, with no credential enforcement.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                passports: sample_passports()
                    .into_iter()
                    .map(|p| (p.agent_id.clone(), p))
                    .collect(),
                packs: sample_policy_packs(),
            }),
            faults: Mutex::new(FaultPlan::default()),
            shape: EnvelopeShape::Data,
            api_key: None,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_shape(mut self, shape: EnvelopeShape) -> Self {
        self.shape = shape;
        self
    }

    /// Require `Bearer <api_key>` on issue, passport lookup, and suspend.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn register(&self, passport: Passport) {
        lock(&self.registry)
            .passports
            .insert(passport.agent_id.clone(), passport);
    }

    pub fn passport(&self, agent_id: &str) -> Option<Passport> {
        lock(&self.registry).passports.get(agent_id).cloned()
    }

    /// Number of requests received, including faulted ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fail the next `times` requests with `fault`.
    pub fn fail_next(&self, times: usize, fault: Fault) {
        *lock(&self.faults) = FaultPlan {
            fault: Some(fault),
            remaining: Some(times),
        };
    }

    /// Fail every request with `fault` until `clear_faults` is called.
    pub fn fail_always(&self, fault: Fault) {
        *lock(&self.faults) = FaultPlan {
            fault: Some(fault),
            remaining: None,
        };
    }

    pub fn clear_faults(&self) {
        *lock(&self.faults) = FaultPlan::default();
    }

    fn take_fault(&self) -> Option<Fault> {
        let mut plan = lock(&self.faults);
        let fault = plan.fault.clone()?;
        match plan.remaining {
            None => Some(fault),
            Some(n) if n > 1 => {
                plan.remaining = Some(n - 1);
                Some(fault)
            }
            Some(n) => {
                *plan = FaultPlan::default();
                (n == 1).then_some(fault)
            }
        }
    }

    // ── Routing ──────────────────────────────────────────────────────────────

    fn route(&self, request: &TransportRequest) -> TransportResponse {
        let segments: Vec<String> = request
            .path
            .trim_start_matches('/')
            .split('/')
            .map(decode_segment)
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["api", "verify", "policy", policy]) => self.verify(policy, request),
            (Method::Post, ["api", "issue"]) => self.authorized(request, |m| m.issue(request)),
            (Method::Get, ["api", "passports", agent_id]) => {
                self.authorized(request, |m| m.get_passport(agent_id))
            }
            (Method::Post, ["api", "suspend"]) => self.authorized(request, |m| m.suspend(request)),
            (Method::Get, ["api", "policies"]) => self.list_packs(),
            (Method::Get, ["api", "policies", pack_id]) => self.get_pack(pack_id),
            _ => error(404, &format!("no route for {} {}", request.method.as_str(), request.path)),
        }
    }

    fn authorized<F>(&self, request: &TransportRequest, handler: F) -> TransportResponse
    where
        F: FnOnce(&Self) -> TransportResponse,
    {
        if let Some(expected) = &self.api_key {
            match request.bearer.as_deref() {
                None => return error(401, "API key required"),
                Some(token) if token != expected => return error(403, "Invalid API key"),
                Some(_) => {}
            }
        }
        handler(self)
    }

    fn envelope(&self, value: Value) -> Value {
        match self.shape {
            EnvelopeShape::Data => json!({ "data": value }),
            EnvelopeShape::Bare => value,
        }
    }

    fn verify(&self, policy: &str, request: &TransportRequest) -> TransportResponse {
        let Some(agent_id) = request
            .body
            .as_ref()
            .and_then(|b| b["context"]["agent_id"].as_str())
            .filter(|id| !id.is_empty())
        else {
            return error(400, "context.agent_id is required");
        };

        let registered = self.passport(agent_id);
        let denial = if agent_id.to_lowercase().contains(DENIED_MARKER) {
            Some(("MOCK_DENIAL", format!("Mock denial for agent {}", agent_id)))
        } else {
            match &registered {
                Some(p) if !p.status.is_active() => Some((
                    "PASSPORT_SUSPENDED",
                    format!("Passport for agent {} is {}", agent_id, p.status),
                )),
                _ => None,
            }
        };

        let allow = denial.is_none();
        let reasons = match &denial {
            Some((code, message)) => json!([{ "code": code, "message": message, "severity": "error" }]),
            None => json!([]),
        };
        let assurance = if allow { "high" } else { "none" };
        let decision = json!({
            "allow": allow,
            "decision_id": format!("dec_{}", Uuid::new_v4().simple()),
            "expires_in": DECISION_TTL_SECONDS,
            "reasons": reasons,
            "assurance_level": assurance,
            "created_at": Utc::now().to_rfc3339(),
        });

        let passport = if allow {
            serde_json::to_value(registered.unwrap_or_else(|| ephemeral_passport(agent_id))).unwrap_or(Value::Null)
        } else {
            Value::Null
        };

        debug!(policy = %policy, agent_id = %agent_id, allow, "mock decision");
        TransportResponse::json(
            200,
            &self.envelope(json!({ "decision": decision, "passport": passport })),
        )
    }

    fn issue(&self, request: &TransportRequest) -> TransportResponse {
        let passport: Passport = match request.body.clone().map(serde_json::from_value) {
            Some(Ok(p)) => p,
            Some(Err(e)) => return error(400, &format!("invalid passport: {}", e)),
            None => return error(400, "passport body is required"),
        };

        let mut registry = lock(&self.registry);
        if registry.passports.contains_key(&passport.agent_id) {
            return error(409, &format!("Passport for agent {} already exists", passport.agent_id));
        }
        registry
            .passports
            .insert(passport.agent_id.clone(), passport.clone());
        drop(registry);

        self.passport_response(201, &passport)
    }

    fn get_passport(&self, agent_id: &str) -> TransportResponse {
        match self.passport(agent_id) {
            Some(passport) => self.passport_response(200, &passport),
            None => error(404, &format!("Passport for agent {} not found", agent_id)),
        }
    }

    fn suspend(&self, request: &TransportRequest) -> TransportResponse {
        let Some(agent_id) = request
            .body
            .as_ref()
            .and_then(|b| b["agent_id"].as_str())
        else {
            return error(400, "agent_id is required");
        };

        let mut registry = lock(&self.registry);
        match registry.passports.get_mut(agent_id) {
            Some(passport) => {
                passport.status = PassportStatus::Suspended;
                if let Some(reason) = request.body.as_ref().and_then(|b| b["reason"].as_str()) {
                    passport
                        .metadata
                        .insert("suspended_reason".to_string(), json!(reason));
                }
                TransportResponse::json(200, &self.envelope(json!({ "success": true })))
            }
            None => error(404, &format!("Passport for agent {} not found", agent_id)),
        }
    }

    fn list_packs(&self) -> TransportResponse {
        let summaries: Vec<_> = lock(&self.registry)
            .packs
            .iter()
            .map(|p| p.summary.clone())
            .collect();
        let body = match self.shape {
            EnvelopeShape::Data => json!({ "data": summaries }),
            EnvelopeShape::Bare => json!(summaries),
        };
        TransportResponse::json(200, &body)
    }

    fn get_pack(&self, pack_id: &str) -> TransportResponse {
        let registry = lock(&self.registry);
        match registry.packs.iter().find(|p| p.summary.id == pack_id) {
            Some(pack) => {
                let value = serde_json::to_value(pack).unwrap_or(Value::Null);
                TransportResponse::json(200, &self.envelope(value))
            }
            None => error(404, &format!("Policy pack {} not found", pack_id)),
        }
    }

    fn passport_response(&self, status: u16, passport: &Passport) -> TransportResponse {
        let value = serde_json::to_value(passport).unwrap_or(Value::Null);
        TransportResponse::json(status, &self.envelope(value))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(call, method = request.method.as_str(), path = %request.path, "mock request");

        match self.take_fault() {
            Some(Fault::Network { reason }) => Err(TransportError::Network { reason }),
            Some(Fault::Status { status, message }) => Ok(error(status, &message)),
            None => Ok(self.route(&request)),
        }
    }
}

fn error(status: u16, message: &str) -> TransportResponse {
    TransportResponse::json(status, &json!({ "message": message }))
}

/// Reverse of the client's path-segment encoding. Malformed escapes are kept
/// as-is.
fn decode_segment(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use aport_contracts::{error::AportError, request::Context};
    use aport_core::{ClientConfig, VerificationClient};

    use super::*;
    use crate::mock_data::{DATA_EXPORTER, PR_MERGER, REFUND_BOT, REFUND_POLICY};

    fn client_over(mock: Arc<MockTransport>, api_key: Option<&str>) -> VerificationClient {
        let mut config = ClientConfig::new("https://mock.aport.local");
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        VerificationClient::new(config, mock).unwrap()
    }

    fn refund_ctx() -> Context {
        json!({ "amount": 50, "currency": "USD" }).as_object().cloned().unwrap()
    }

    // ── Decisions ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn active_agent_is_allowed_with_passport() {
        let client = client_over(Arc::new(MockTransport::new()), None);
        let result = client.verify(REFUND_POLICY, REFUND_BOT, &refund_ctx()).await.unwrap();

        assert!(result.verified);
        assert!(result.decision.decision_id.starts_with("dec_"));
        assert_eq!(result.decision.expires_in_seconds, DECISION_TTL_SECONDS);
        assert_eq!(result.decision.assurance_level.as_deref(), Some("high"));
        assert!(result.decision.created_at.is_some());
        assert_eq!(result.passport.unwrap().name, "Refund Bot");
    }

    #[tokio::test]
    async fn denied_marker_is_case_insensitive() {
        let client = client_over(Arc::new(MockTransport::new()), None);
        let result = client.verify(REFUND_POLICY, "agt_DENIED_1", &Context::new()).await.unwrap();

        assert!(!result.verified);
        assert!(result.decision.has_reason_code("MOCK_DENIAL"));
        assert!(result.passport.is_none());
    }

    #[tokio::test]
    async fn suspended_passport_is_denied() {
        let client = client_over(Arc::new(MockTransport::new()), None);
        let result = client.verify("repo.v1", PR_MERGER, &Context::new()).await.unwrap();

        assert!(!result.verified);
        assert!(result.decision.has_reason_code("PASSPORT_SUSPENDED"));
        assert!(!result.decision.reasons.is_empty());
    }

    #[tokio::test]
    async fn decision_ids_are_never_reused() {
        let client = client_over(Arc::new(MockTransport::new()), None);
        let mut ids = std::collections::HashSet::new();
        for _ in 0..20 {
            let result = client.verify(REFUND_POLICY, REFUND_BOT, &Context::new()).await.unwrap();
            assert!(ids.insert(result.decision.decision_id));
        }
    }

    #[tokio::test]
    async fn envelope_shape_does_not_change_the_result() {
        let data = client_over(Arc::new(MockTransport::new()), None);
        let bare = client_over(Arc::new(MockTransport::new().with_shape(EnvelopeShape::Bare)), None);

        for agent in [REFUND_BOT, PR_MERGER, "agt_denied"] {
            let a = data.verify(REFUND_POLICY, agent, &Context::new()).await.unwrap();
            let b = bare.verify(REFUND_POLICY, agent, &Context::new()).await.unwrap();
            assert_eq!(a.verified, b.verified);
            assert_eq!(a.decision.reasons, b.decision.reasons);
            assert_eq!(a.passport, b.passport);
        }

        assert_eq!(data.list_policy_packs().await.unwrap(), bare.list_policy_packs().await.unwrap());
        assert_eq!(
            data.get_policy_pack(REFUND_POLICY).await.unwrap(),
            bare.get_policy_pack(REFUND_POLICY).await.unwrap()
        );
    }

    // ── Passport lifecycle ───────────────────────────────────────────────────

    #[tokio::test]
    async fn issue_then_suspend_then_deny() {
        let mock = Arc::new(MockTransport::new().with_api_key("ak_admin"));
        let client = client_over(mock.clone(), Some("ak_admin"));

        let created = client.create_passport(&Passport::new("agt_new", "New Agent")).await.unwrap();
        assert_eq!(created.agent_id, "agt_new");
        assert!(client.verify(REFUND_POLICY, "agt_new", &Context::new()).await.unwrap().verified);

        assert!(client.suspend_passport("agt_new", "fraud").await.unwrap().success);
        assert_eq!(mock.passport("agt_new").unwrap().status, PassportStatus::Suspended);

        let after = client.verify(REFUND_POLICY, "agt_new", &Context::new()).await.unwrap();
        assert!(!after.verified);
        assert!(after.decision.has_reason_code("PASSPORT_SUSPENDED"));
    }

    #[tokio::test]
    async fn duplicate_issue_is_http_failure() {
        let client = client_over(Arc::new(MockTransport::new()), Some("ak_admin"));
        match client.create_passport(&Passport::new(DATA_EXPORTER, "Again")).await {
            Err(AportError::HttpFailure { status: 409, message }) => assert!(message.contains("already exists")),
            other => panic!("expected HttpFailure 409, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let mock = Arc::new(MockTransport::new().with_api_key("ak_admin"));
        let client = client_over(mock, Some("ak_wrong"));
        assert!(matches!(
            client.suspend_passport(REFUND_BOT, "x").await,
            Err(AportError::AuthError { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn suspended_passport_lookup_falls_back_to_authenticated_get() {
        let mock = Arc::new(MockTransport::new().with_api_key("ak_admin"));
        let client = client_over(mock.clone(), Some("ak_admin"));

        let passport = client.get_passport(PR_MERGER).await.unwrap();
        assert_eq!(passport.status, PassportStatus::Suspended);
        assert_eq!(mock.call_count(), 2, "probe plus authenticated lookup");
    }

    #[tokio::test]
    async fn unknown_pack_is_not_found() {
        let client = client_over(Arc::new(MockTransport::new()), None);
        assert!(matches!(
            client.get_policy_pack("nope.v9").await,
            Err(AportError::NotFound { .. })
        ));
    }

    // ── Faults ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn injected_faults_expire() {
        let mock = Arc::new(MockTransport::new());
        let client = client_over(mock.clone(), None);

        mock.fail_next(
            2,
            Fault::Status {
                status: 503,
                message: "maintenance".to_string(),
            },
        );
        for _ in 0..2 {
            assert!(matches!(
                client.verify(REFUND_POLICY, REFUND_BOT, &Context::new()).await,
                Err(AportError::ServiceError { status: 503, .. })
            ));
        }
        assert!(client.verify(REFUND_POLICY, REFUND_BOT, &Context::new()).await.is_ok());

        mock.fail_always(Fault::Network {
            reason: "connection refused".to_string(),
        });
        assert!(matches!(
            client.verify(REFUND_POLICY, REFUND_BOT, &Context::new()).await,
            Err(AportError::NetworkFailure { .. })
        ));
        mock.clear_faults();
        assert!(client.verify(REFUND_POLICY, REFUND_BOT, &Context::new()).await.is_ok());
        assert_eq!(mock.call_count(), 5);
    }

    #[test]
    fn decode_reverses_encoding() {
        assert_eq!(decode_segment("agt%2F..%2Fadmin"), "agt/../admin");
        assert_eq!(decode_segment("a%20b"), "a b");
        assert_eq!(decode_segment("100%"), "100%");
        assert_eq!(decode_segment("%zz"), "%zz");
    }
}
