//! # aport-guard
//!
//! Guards that gate execution on an APort verification decision.
//!
//! ## Overview
//!
//! - [`PolicyGuard`] protects request handlers. Server adapters copy the
//!   inbound request into an [`InboundRequest`], call `check`, and turn the
//!   [`GuardOutcome`] into either a handler call or an error response.
//! - [`CheckpointGuard`] protects agent workflows. It verifies before each
//!   node runs and before state transitions, with per-node policies and
//!   required capabilities read from TOML.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use aport_guard::{GuardOutcome, InboundRequest, PolicyGuard};
//!
//! let guard = PolicyGuard::new(client, "payments.refund.v1");
//! match guard.check(&InboundRequest::new("POST", "/refund").with_header("X-Agent-ID", id)).await {
//!     GuardOutcome::Proceed(ctx) => handle(ctx),
//!     GuardOutcome::Reject(r) => respond(r.status, r.body()),
//!     GuardOutcome::ProceedUnverified { .. } => handle_degraded(),
//! }
//! ```

pub mod checkpoint;
pub mod guard;
pub mod resolver;
pub mod rule;

#[cfg(test)]
mod testing;

pub use checkpoint::{AgentIdExtractor, CheckpointError, CheckpointGuard, CheckpointVerification, NodeGuard, WorkflowState};
pub use guard::{GuardContext, GuardOutcome, PolicyGuard, Rejection};
pub use resolver::{AgentIdResolver, InboundRequest};
pub use rule::{CheckpointConfig, CheckpointRule};
