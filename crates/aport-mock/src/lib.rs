//! # aport-mock
//!
//! In-process mock of the APort verification service.
//!
//! [`MockTransport`] plugs into a `VerificationClient` in place of the HTTP
//! transport and answers from an in-memory registry seeded with three sample
//! agents:
//!
//! 1. **Refund bot** (`ap_128094d3`): active, holds `payments.refund`.
//! 2. **Data exporter** (`agt_tmpl_mg8jr8l1_geckvz`): active, holds
//!    `data.export`.
//! 3. **PR merger** (`agt_tmpl_mg8jtzzk_rl0diw`): suspended.
//!
//! The `scenarios` module runs the demo walk-throughs the CLI exposes.
//! All data is hardcoded and fictional. No network calls are made.

pub mod mock_data;
pub mod scenarios;
pub mod transport;

pub use transport::{EnvelopeShape, Fault, MockTransport};
