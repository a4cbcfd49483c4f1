//! Runnable demo scenarios.
//!
//! Each scenario wires a real `VerificationClient` (and guards where needed)
//! to a fresh `MockTransport`, walks through one integration pattern, and
//! prints what happened. A scenario fails with `ScenarioError::Unexpected`
//! if the mock service answers differently than the walk-through expects.

pub mod error_handling;
pub mod refund;
pub mod workflow;

use std::sync::Arc;

use thiserror::Error;

use aport_contracts::error::AportError;
use aport_core::{ClientConfig, VerificationClient};
use aport_guard::CheckpointError;

use crate::transport::MockTransport;

pub const MOCK_BASE_URL: &str = "https://mock.aport.local";
pub const MOCK_ADMIN_KEY: &str = "ak_mock_admin";

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Client(#[from] AportError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("unexpected outcome: {0}")]
    Unexpected(String),
}

pub type ScenarioResult = Result<(), ScenarioError>;

/// A client over `mock`, optionally authenticated with the mock admin key.
pub fn mock_client(mock: &Arc<MockTransport>, authenticated: bool) -> Result<VerificationClient, AportError> {
    let mut config = ClientConfig::new(MOCK_BASE_URL);
    if authenticated {
        config = config.with_api_key(MOCK_ADMIN_KEY);
    }
    VerificationClient::new(config, mock.clone())
}

pub(crate) fn expect(condition: bool, what: &str) -> ScenarioResult {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::Unexpected(what.to_string()))
    }
}

/// Run every scenario in order.
pub async fn run_all() -> ScenarioResult {
    refund::run_scenario().await?;
    workflow::run_scenario().await?;
    error_handling::run_scenario().await
}
