//! # aport-core
//!
//! Client for the APort agent-verification service.
//!
//! This crate provides:
//! - The `Transport` seam and its `reqwest`-backed `HttpTransport`
//! - The request builder and decision parser
//! - The `VerificationClient` that wires them together
//! - Opt-in retry with exponential backoff
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aport_core::{ClientConfig, VerificationClient};
//!
//! let client = VerificationClient::with_http(ClientConfig::from_env()?)?;
//! let result = client.verify("payments.refund.v1", "agt_1", &context).await?;
//! if !result.verified {
//!     println!("denied: {}", result.decision.denial_summary());
//! }
//! ```

pub mod builder;
pub mod cancel;
pub mod client;
pub mod config;
pub mod http;
pub mod parser;
pub mod retry;
pub mod traits;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use client::{VerificationClient, PASSPORT_PROBE_POLICY};
pub use config::{CallOptions, ClientConfig};
pub use http::HttpTransport;
pub use retry::{with_retry, RetryPolicy};
pub use traits::{Method, Transport, TransportRequest, TransportResponse};
