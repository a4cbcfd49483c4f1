//! Test fakes shared by the guard tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use aport_contracts::error::TransportError;
use aport_core::{ClientConfig, Transport, TransportRequest, TransportResponse, VerificationClient};

type Handler = dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Answers every request with `handler` and records what was sent.
pub struct StubTransport {
    handler: Box<Handler>,
    seen: Arc<Mutex<Vec<TransportRequest>>>,
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let outcome = (self.handler)(&request);
        self.seen.lock().unwrap().push(request);
        outcome
    }
}

pub fn stub_client<F>(handler: F) -> (VerificationClient, Arc<Mutex<Vec<TransportRequest>>>)
where
    F: Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
{
    let seen = Arc::new(Mutex::new(vec![]));
    let transport = StubTransport {
        handler: Box::new(handler),
        seen: seen.clone(),
    };
    let client = VerificationClient::new(ClientConfig::new("https://api.aport.test"), Arc::new(transport)).unwrap();
    (client, seen)
}

pub fn allow_body(decision_id: &str) -> Value {
    json!({
        "data": { "decision": { "allow": true, "decision_id": decision_id, "expires_in": 60, "reasons": [] } }
    })
}

pub fn allow_with_passport(decision_id: &str, passport: Value) -> Value {
    json!({
        "decision": { "allow": true, "decision_id": decision_id, "expires_in": 60 },
        "passport": passport
    })
}

pub fn deny_body(decision_id: &str, code: &str, message: &str) -> Value {
    json!({
        "decision": {
            "allow": false,
            "decision_id": decision_id,
            "reasons": [{ "code": code, "message": message }]
        }
    })
}
