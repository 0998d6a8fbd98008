//! Command-line interface definition.

use alloy_primitives::Address;
use clap::Parser;
use receipt_gate::config::{default_config_path, GateConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Pay-per-request gateway admitting callers with an unused on-chain token transfer.
#[derive(Parser, Debug)]
#[command(name = "receipt-gate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, short, env = "RECEIPT_GATE_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Chain JSON-RPC endpoint.
    #[arg(long, env = "RECEIPT_GATE_RPC_URL")]
    pub rpc_url: Option<String>,

    /// EIP-155 chain id payments are made on.
    #[arg(long, env = "RECEIPT_GATE_CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Token contract that must be transferred.
    #[arg(long, env = "CAT_TOKEN_ADDRESS")]
    pub token_address: Option<Address>,

    /// Address that must receive the payment.
    #[arg(long, env = "SERVER_WALLET_ADDRESS")]
    pub recipient_address: Option<Address>,

    /// Price per request in whole tokens.
    #[arg(long, env = "RECEIPT_GATE_PRICE")]
    pub price: Option<String>,

    /// Allow resubmitting hashes of transactions that failed on-chain.
    #[arg(long)]
    pub retry_failed_transactions: bool,

    /// API key for the generative backend.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    pub json_logs: bool,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    pub write_config: bool,
}

impl Cli {
    /// Path of the configuration file in use.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    /// Convert CLI arguments into a `GateConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<GateConfig> {
        // Start with the config file if one was given or exists at the
        // default location, otherwise defaults.
        let path = self.config_path();
        let mut config = if self.config.is_some() || path.exists() {
            GateConfig::from_file(&path)?
        } else {
            GateConfig::default()
        };

        // Override with CLI arguments
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(rpc_url) = self.rpc_url {
            config.chain.rpc_url = rpc_url;
        }
        if let Some(chain_id) = self.chain_id {
            config.chain.chain_id = chain_id;
        }
        if let Some(token) = self.token_address {
            config.payment.token_address = token;
        }
        if let Some(recipient) = self.recipient_address {
            config.payment.recipient_address = recipient;
        }
        if let Some(price) = self.price {
            config.payment.price = price;
        }
        if self.retry_failed_transactions {
            config.payment.retry_failed_transactions = true;
        }
        if let Some(api_key) = self.api_key {
            config.backend.api_key = Some(api_key);
        }
        config.log_level = self.log_level;

        Ok(config)
    }
}
