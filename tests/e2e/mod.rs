//! End-to-end tests for receipt-gate.
//!
//! Each test starts a mock JSON-RPC chain and a gateway bound to an
//! ephemeral port, then drives it over HTTP.
//!
//! ```bash
//! cargo test --test e2e
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod payment_flow;
