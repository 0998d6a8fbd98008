//! # receipt-gate
//!
//! Pay-per-request HTTP gateway backed by on-chain ERC-20 payments.
//!
//! A caller pays by transferring the configured token to the configured
//! recipient and presents the transaction hash as
//! `Authorization: Token <tx-hash>`. The gateway fetches the receipt from
//! the chain, checks token, recipient and amount, and lets the request reach
//! the metered backend. Each transaction hash admits at most one request.
//!
//! ## Layout
//!
//! - [`payment`]: proof extraction, receipt fetching, transfer decoding,
//!   replay protection and the admission decision
//! - [`gateway`]: HTTP routes and server lifecycle
//! - [`backend`]: the metered generative backend
//! - [`config`]: TOML configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use receipt_gate::{GateConfig, GatewayBuilder};
//!
//! #[tokio::main]
//! async fn main() -> receipt_gate::Result<()> {
//!     let mut gateway = GatewayBuilder::new(GateConfig::default()).build().await?;
//!     gateway.run().await
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod payment;

pub use config::GateConfig;
pub use error::{Error, Result};
pub use event::{GateEvent, GateEventsChannel};
pub use gateway::{GatewayBuilder, RunningGateway, ShutdownHandle};
pub use payment::{Decision, PaymentRequirement, PaymentVerifier, ProofToken, Rejection};
