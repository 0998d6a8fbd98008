//! Ethereum JSON-RPC receipt source.
//!
//! Talks plain JSON-RPC 2.0 over HTTP to any EVM node:
//! `eth_getTransactionReceipt` for verification and `eth_chainId` for a
//! startup sanity check.

use crate::error::{Error, Result};
use crate::payment::proof::ProofToken;
use crate::payment::receipt::{ChainReceipt, LogEntry, ReceiptSource, ReceiptStatus};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

const ADDRESS_LEN: usize = 20;

/// Configuration for the JSON-RPC receipt source.
#[derive(Debug, Clone)]
pub struct JsonRpcConfig {
    /// HTTP(S) URL of the node.
    pub url: String,
    /// Timeout applied to every call.
    pub request_timeout: Duration,
}

impl Default for JsonRpcConfig {
    fn default() -> Self {
        Self {
            url: "https://api-mezame.shardeum.org".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Receipt source backed by an EVM node's JSON-RPC endpoint.
pub struct JsonRpcReceiptSource {
    config: JsonRpcConfig,
    http: reqwest::Client,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcReceipt {
    /// `0x1` on success, `0x0` on revert. Absent on pre-Byzantium chains.
    status: Option<String>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

/// Kept as raw bytes so one odd log cannot make the whole receipt
/// undecodable; the codec decides what qualifies.
#[derive(Debug, Deserialize)]
struct RpcLog {
    address: Bytes,
    #[serde(default)]
    topics: Vec<Bytes>,
    #[serde(default)]
    data: Bytes,
}

impl From<RpcReceipt> for ChainReceipt {
    fn from(r: RpcReceipt) -> Self {
        let status = match r.status.as_deref().map(parse_quantity) {
            Some(Ok(1)) => ReceiptStatus::Success,
            _ => ReceiptStatus::Failure,
        };
        Self {
            status,
            logs: r
                .logs
                .into_iter()
                .filter_map(|l| {
                    let address = (l.address.len() == ADDRESS_LEN)
                        .then(|| Address::from_slice(&l.address))?;
                    Some(LogEntry {
                        address,
                        topics: l.topics,
                        data: l.data,
                    })
                })
                .collect(),
        }
    }
}

/// Parse a JSON-RPC hex quantity such as `0x1fb7`.
fn parse_quantity(s: &str) -> Result<u64> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| Error::Rpc(format!("quantity without 0x prefix: {s}")))?;
    u64::from_str_radix(digits, 16).map_err(|e| Error::Rpc(format!("bad quantity {s}: {e}")))
}

impl JsonRpcReceiptSource {
    /// Create a receipt source for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: JsonRpcConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build RPC client: {e}")))?;
        Ok(Self {
            config,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// The endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Ask the node which chain it serves.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the answer is not a quantity.
    pub async fn chain_id(&self) -> Result<u64> {
        let raw: Option<String> = self.call("eth_chainId", json!([])).await?;
        let raw = raw.ok_or_else(|| Error::Rpc("eth_chainId returned null".to_string()))?;
        parse_quantity(&raw)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.config.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::Rpc(format!("{method}: undecodable response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(Error::Rpc(format!(
                "{method}: node error {}: {}",
                err.code, err.message
            )));
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl ReceiptSource for JsonRpcReceiptSource {
    async fn transaction_receipt(&self, proof: &ProofToken) -> Result<ChainReceipt> {
        debug!("Fetching receipt for {proof} from {}", self.config.url);

        let receipt: Option<RpcReceipt> = self
            .call("eth_getTransactionReceipt", json!([proof.to_string()]))
            .await?;

        receipt
            .map(ChainReceipt::from)
            .ok_or_else(|| Error::Rpc(format!("no receipt for transaction {proof}")))
    }
}
