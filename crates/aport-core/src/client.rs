//! The verification client: the façade every integration calls.
//!
//! Each operation follows the same pipeline:
//!
//!   Validate → Build payload → Transport (timeout, cancel) → Status check → Parse
//!
//! The client holds only its static `ClientConfig` and a shared `Transport`.
//! It never retries, never caches decisions, and never turns an error into a
//! deny: every failure is returned to the caller as a typed `AportError`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use aport_contracts::{
    decision::VerificationResult,
    error::{AportError, AportResult, TransportError},
    passport::{Passport, SuspendOutcome},
    policy_pack::{PolicyPackDetail, PolicyPackSummary},
    request::{Context, VerifyRequest},
};

use crate::builder;
use crate::config::{CallOptions, ClientConfig};
use crate::http::HttpTransport;
use crate::parser;
use crate::traits::{Method, Transport, TransportRequest, TransportResponse};

/// Low-privilege policy used to look a passport up without a credential.
pub const PASSPORT_PROBE_POLICY: &str = "passport.lookup.v1";

/// Client for the APort verification service.
///
/// Cloning is cheap; clones share the transport. Safe to use from many tasks
/// at once: there is no mutable state.
#[derive(Clone)]
pub struct VerificationClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for VerificationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VerificationClient {
    /// Create a client over an injected transport.
    ///
    /// The configuration is validated here and never changes afterwards.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> AportResult<Self> {
        let config = config.validate()?;
        debug!(
            base_url = %config.base_url,
            authenticated = config.has_api_key(),
            timeout_ms = config.timeout.as_millis() as u64,
            "verification client created"
        );
        Ok(Self { config, transport })
    }

    /// Create a client over the real HTTPS transport.
    pub fn with_http(config: ClientConfig) -> AportResult<Self> {
        let config = config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Self::new(config, Arc::new(transport))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ── Verification ─────────────────────────────────────────────────────────

    /// Verify `agent_id` against `policy` with the given context.
    ///
    /// # Errors
    ///
    /// - `Validation` if `policy` or `agent_id` is empty (no request is sent)
    /// - `AuthError` on 401/403, `NotFound` on 404, `ServiceError` on 5xx,
    ///   `HttpFailure` on any other status ≥ 400
    /// - `NetworkFailure` when no response arrived (including timeouts)
    /// - `MalformedResponse` when the body holds no usable decision
    ///
    /// A denial is not an error: it is `Ok` with `verified == false`.
    pub async fn verify(
        &self,
        policy: &str,
        agent_id: &str,
        context: &Context,
    ) -> AportResult<VerificationResult> {
        self.verify_with(policy, agent_id, context, &CallOptions::default())
            .await
    }

    /// Alias of [`verify`](Self::verify) with the identical contract.
    pub async fn verify_policy(
        &self,
        policy: &str,
        agent_id: &str,
        context: &Context,
    ) -> AportResult<VerificationResult> {
        self.verify(policy, agent_id, context).await
    }

    /// [`verify`](Self::verify) with per-call timeout, cancellation, and
    /// idempotency key.
    pub async fn verify_with(
        &self,
        policy: &str,
        agent_id: &str,
        context: &Context,
        options: &CallOptions,
    ) -> AportResult<VerificationResult> {
        self.verify_as(policy, agent_id, context, options, self.config.api_key.clone())
            .await
    }

    /// Run independent verify calls concurrently.
    ///
    /// Results come back in input order, one per request; one failure does
    /// not affect the others.
    pub async fn verify_many(
        &self,
        requests: &[VerifyRequest],
        options: &CallOptions,
    ) -> Vec<AportResult<VerificationResult>> {
        debug!(count = requests.len(), "starting batch verification");
        join_all(
            requests
                .iter()
                .map(|r| self.verify_with(&r.policy, &r.agent_id, &r.context, options)),
        )
        .await
    }

    async fn verify_as(
        &self,
        policy: &str,
        agent_id: &str,
        context: &Context,
        options: &CallOptions,
        bearer: Option<String>,
    ) -> AportResult<VerificationResult> {
        // ── Step 1: Validate and build (no I/O on failure) ───────────────────
        let payload = builder::verify_payload(policy, agent_id, context)?;
        let body = serde_json::to_value(&payload).map_err(|e| AportError::Validation {
            reason: format!("verify payload is not serializable: {}", e),
        })?;

        debug!(policy = %policy, agent_id = %agent_id, "verifying agent");

        // ── Step 2: Send ─────────────────────────────────────────────────────
        let request = self.request(Method::Post, builder::verify_path(policy), Some(body), bearer, options);
        let response = self.execute(request, options).await?;

        // ── Step 3: Normalize the decision ───────────────────────────────────
        let result = parser::parse_verification(&response.body)?;

        if result.verified {
            info!(
                policy = %policy,
                agent_id = %agent_id,
                decision_id = %result.decision.decision_id,
                "verification allowed"
            );
        } else {
            warn!(
                policy = %policy,
                agent_id = %agent_id,
                decision_id = %result.decision.decision_id,
                reasons = %result.decision.denial_summary(),
                "verification denied"
            );
        }

        Ok(result)
    }

    // ── Passports ────────────────────────────────────────────────────────────

    /// Issue a new passport. Requires an API key.
    pub async fn create_passport(&self, passport: &Passport) -> AportResult<Passport> {
        self.create_passport_with(passport, &CallOptions::default()).await
    }

    pub async fn create_passport_with(
        &self,
        passport: &Passport,
        options: &CallOptions,
    ) -> AportResult<Passport> {
        let key = self.require_key("create_passport")?;
        let body = builder::passport_payload(passport)?;

        let request = self.request(Method::Post, "/api/issue".to_string(), Some(body), Some(key), options);
        let response = self.execute(request, options).await?;
        let created = parser::parse_passport(&response.body)?;

        info!(agent_id = %created.agent_id, status = %created.status, "passport issued");
        Ok(created)
    }

    /// Look a passport up.
    ///
    /// An unauthenticated probe verify against [`PASSPORT_PROBE_POLICY`] is
    /// tried first. If it yields no passport and an API key is configured, the
    /// authenticated `GET /api/passports/{agent_id}` is used. Without a key
    /// the call fails with `AuthRequired`.
    pub async fn get_passport(&self, agent_id: &str) -> AportResult<Passport> {
        self.get_passport_with(agent_id, &CallOptions::default()).await
    }

    pub async fn get_passport_with(
        &self,
        agent_id: &str,
        options: &CallOptions,
    ) -> AportResult<Passport> {
        builder::require_id("agent_id", agent_id)?;

        match self
            .verify_as(PASSPORT_PROBE_POLICY, agent_id, &Context::new(), options, None)
            .await
        {
            Ok(VerificationResult {
                passport: Some(passport),
                ..
            }) => {
                debug!(agent_id = %agent_id, "passport resolved by probe");
                return Ok(passport);
            }
            Ok(_) => debug!(agent_id = %agent_id, "probe returned no passport"),
            Err(AportError::Cancelled) => return Err(AportError::Cancelled),
            Err(e) => debug!(agent_id = %agent_id, error = %e, "passport probe failed"),
        }

        let key = self.require_key("get_passport")?;
        warn!(agent_id = %agent_id, "falling back to authenticated passport lookup");

        let request = self.request(Method::Get, builder::passport_path(agent_id), None, Some(key), options);
        let response = self.execute(request, options).await?;
        parser::parse_passport(&response.body)
    }

    /// Suspend an agent's passport. Requires an API key.
    pub async fn suspend_passport(&self, agent_id: &str, reason: &str) -> AportResult<SuspendOutcome> {
        self.suspend_passport_with(agent_id, reason, &CallOptions::default())
            .await
    }

    pub async fn suspend_passport_with(
        &self,
        agent_id: &str,
        reason: &str,
        options: &CallOptions,
    ) -> AportResult<SuspendOutcome> {
        let key = self.require_key("suspend_passport")?;
        let payload = builder::suspend_payload(agent_id, reason)?;
        let body = serde_json::to_value(&payload).map_err(|e| AportError::Validation {
            reason: format!("suspend payload is not serializable: {}", e),
        })?;

        let request = self.request(Method::Post, "/api/suspend".to_string(), Some(body), Some(key), options);
        let response = self.execute(request, options).await?;
        let outcome = parser::parse_suspend(&response.body)?;

        info!(agent_id = %agent_id, success = outcome.success, "passport suspend requested");
        Ok(outcome)
    }

    // ── Policy packs ─────────────────────────────────────────────────────────

    pub async fn list_policy_packs(&self) -> AportResult<Vec<PolicyPackSummary>> {
        self.list_policy_packs_with(&CallOptions::default()).await
    }

    pub async fn list_policy_packs_with(&self, options: &CallOptions) -> AportResult<Vec<PolicyPackSummary>> {
        let request = self.request(
            Method::Get,
            "/api/policies".to_string(),
            None,
            self.config.api_key.clone(),
            options,
        );
        let response = self.execute(request, options).await?;
        parser::parse_policy_list(&response.body)
    }

    pub async fn get_policy_pack(&self, pack_id: &str) -> AportResult<PolicyPackDetail> {
        self.get_policy_pack_with(pack_id, &CallOptions::default()).await
    }

    pub async fn get_policy_pack_with(
        &self,
        pack_id: &str,
        options: &CallOptions,
    ) -> AportResult<PolicyPackDetail> {
        builder::require_id("policy pack id", pack_id)?;
        let request = self.request(
            Method::Get,
            builder::policy_pack_path(pack_id),
            None,
            self.config.api_key.clone(),
            options,
        );
        let response = self.execute(request, options).await?;
        parser::parse_policy_detail(&response.body)
    }

    // ── Plumbing ─────────────────────────────────────────────────────────────

    fn require_key(&self, operation: &str) -> AportResult<String> {
        self.config
            .api_key
            .clone()
            .ok_or_else(|| AportError::AuthRequired {
                operation: operation.to_string(),
            })
    }

    fn request(
        &self,
        method: Method,
        path: String,
        body: Option<serde_json::Value>,
        bearer: Option<String>,
        options: &CallOptions,
    ) -> TransportRequest {
        TransportRequest {
            method,
            path,
            body,
            bearer,
            idempotency_key: options.idempotency_key.clone(),
            timeout: options.timeout.unwrap_or(self.config.timeout),
        }
    }

    /// Send one request, enforcing the timeout and cancellation signal, and
    /// map non-success statuses onto the error taxonomy.
    async fn execute(
        &self,
        request: TransportRequest,
        options: &CallOptions,
    ) -> AportResult<TransportResponse> {
        let method = request.method;
        let path = request.path.clone();
        let budget = request.timeout;

        let send = bounded(self.transport.send(request), budget);

        let outcome = match &options.cancel {
            Some(signal) => {
                if signal.is_cancelled() {
                    return Err(AportError::Cancelled);
                }
                tokio::select! {
                    biased;
                    () = signal.cancelled() => {
                        warn!(method = method.as_str(), path = %path, "call cancelled by caller");
                        return Err(AportError::Cancelled);
                    }
                    outcome = send => outcome,
                }
            }
            None => send.await,
        };

        let response = outcome.map_err(|e| {
            warn!(method = method.as_str(), path = %path, error = %e, "transport failure");
            AportError::from(e)
        })?;

        debug!(method = method.as_str(), path = %path, status = response.status, "response received");
        check_status(response)
    }
}

/// Apply the call budget regardless of whether the transport honors it.
async fn bounded<F>(send: F, budget: Duration) -> Result<TransportResponse, TransportError>
where
    F: std::future::Future<Output = Result<TransportResponse, TransportError>>,
{
    match tokio::time::timeout(budget, send).await {
        Ok(outcome) => outcome,
        Err(_) => Err(TransportError::Timeout { after: budget }),
    }
}

/// Map an HTTP status onto the error taxonomy. Statuses below 400 pass through.
fn check_status(response: TransportResponse) -> AportResult<TransportResponse> {
    let status = response.status;
    if status < 400 {
        return Ok(response);
    }

    let message = parser::error_message(&response.body);
    Err(match status {
        401 | 403 => AportError::AuthError { status, message },
        404 => AportError::NotFound { message },
        500..=599 => AportError::ServiceError { status, message },
        _ => AportError::HttpFailure { status, message },
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────
