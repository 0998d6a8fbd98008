//! Transaction receipts and the capability that fetches them.

use crate::error::Result;
use crate::payment::proof::ProofToken;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

/// Execution outcome of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Executed successfully.
    Success,
    /// Reverted, or a receipt without a success status.
    Failure,
}

/// One emitted event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Contract that emitted the log.
    pub address: Address,
    /// Indexed topics, in order, as delivered by the node.
    pub topics: Vec<Bytes>,
    /// Unindexed payload.
    pub data: Bytes,
}

/// Outcome of a transaction as reported by the chain.
///
/// Fetched fresh for every verification and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    /// Execution status.
    pub status: ReceiptStatus,
    /// Emitted logs, in order.
    pub logs: Vec<LogEntry>,
}

impl ChainReceipt {
    /// Whether the transaction executed successfully.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Source of transaction receipts, treated as ground truth.
///
/// Implementations must return an error (not a failed receipt) when the
/// transaction is unknown or the endpoint cannot answer.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    /// Fetch the receipt of the transaction identified by `proof`.
    async fn transaction_receipt(&self, proof: &ProofToken) -> Result<ChainReceipt>;
}
