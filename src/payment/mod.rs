//! On-chain payment verification.
//!
//! A caller pays by sending an ERC-20 transfer to the configured recipient
//! and presenting the transaction hash as `Authorization: Token <hash>`.
//! The gate fetches the receipt, checks it, and admits each hash at most
//! once.
//!
//! # Architecture
//!
//! ```text
//! request received
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ extract_proof       │── none ──▶ 402 PaymentRequired
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ reserve in store    │── taken ─▶ 403 ProofAlreadyUsed
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ fetch receipt (RPC) │── error ─▶ 500, reservation released
//! └─────────┬───────────┘
//!           ▼
//! ┌─────────────────────┐
//! │ check Transfer log  │── fail ──▶ 402 + reason, reservation released
//! └─────────┬───────────┘
//!           ▼
//!    confirm + Admit
//! ```

pub mod codec;
mod extractor;
mod proof;
mod receipt;
mod requirement;
mod rpc;
mod store;
mod verifier;

pub use codec::{TransferEvent, TRANSFER_EVENT_SIGNATURE};
pub use extractor::{extract_proof, PROOF_SCHEME};
pub use proof::{MalformedProof, ProofToken};
pub use receipt::{ChainReceipt, LogEntry, ReceiptSource, ReceiptStatus};
pub use requirement::{
    to_smallest_unit, AmountError, NetworkInfo, PaymentInstructions, PaymentRequirement,
};
pub use rpc::{JsonRpcConfig, JsonRpcReceiptSource};
pub use store::{InMemoryProofStore, ProofStore, StoreStats};
pub use verifier::{
    check_transfer, Admission, Decision, PaymentVerifier, PaymentVerifierConfig, Rejection,
    VerificationError, VerifierStats,
};
