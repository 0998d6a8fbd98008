//! Configuration for receipt-gate.

use crate::payment::{
    to_smallest_unit, JsonRpcConfig, NetworkInfo, PaymentRequirement, PaymentVerifierConfig,
};
use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Chain the payments are made on.
    #[serde(default)]
    pub chain: ChainConfig,

    /// Price of one generation.
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Metered generative backend.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (port 0 for auto-select).
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

/// Chain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// EIP-155 chain id.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Short network name used in the advertised network identity.
    #[serde(default = "default_network_slug")]
    pub network_slug: String,

    /// Human readable network name.
    #[serde(default = "default_network_name")]
    pub network_name: String,

    /// Timeout for each RPC call, in seconds.
    #[serde(default = "default_rpc_timeout")]
    pub request_timeout_secs: u64,
}

/// Payment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Contract of the token that must be transferred.
    #[serde(default = "default_token_address")]
    pub token_address: Address,

    /// Address that must receive the transfer.
    #[serde(default = "default_recipient_address")]
    pub recipient_address: Address,

    /// Token ticker shown to callers.
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,

    /// Price per request in whole tokens, as a decimal string.
    #[serde(default = "default_price")]
    pub price: String,

    /// Token decimals.
    #[serde(default = "default_decimals")]
    pub decimals: u8,

    /// Allow resubmitting the hash of a transaction that failed on-chain.
    #[serde(default)]
    pub retry_failed_transactions: bool,
}

/// Generative backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the generative language API.
    #[serde(default = "default_backend_endpoint")]
    pub endpoint: String,

    /// Model used when the request names none.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// API key. Requests are refused with a configuration error without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Timeout for a generation call, in seconds.
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            chain: ChainConfig::default(),
            payment: PaymentConfig::default(),
            backend: BackendConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            network_slug: default_network_slug(),
            network_name: default_network_name(),
            request_timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            token_address: default_token_address(),
            recipient_address: default_recipient_address(),
            token_symbol: default_token_symbol(),
            price: default_price(),
            decimals: default_decimals(),
            retry_failed_transactions: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_backend_endpoint(),
            default_model: default_model(),
            api_key: None,
            timeout_secs: default_backend_timeout(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_rpc_url() -> String {
    "https://api-mezame.shardeum.org".to_string()
}

const fn default_chain_id() -> u64 {
    8119
}

fn default_network_slug() -> String {
    "shardeum".to_string()
}

fn default_network_name() -> String {
    "Shardeum EVM Testnet".to_string()
}

const fn default_rpc_timeout() -> u64 {
    15
}

const fn default_token_address() -> Address {
    address!("4f84710401a38d70F78A7978912Cd8fd1F51E583")
}

const fn default_recipient_address() -> Address {
    address!("742d35Cc6634C0532925a3b844Bc454e4438f44e")
}

fn default_token_symbol() -> String {
    "CAT".to_string()
}

fn default_price() -> String {
    "1".to_string()
}

const fn default_decimals() -> u8 {
    18
}

fn default_backend_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

const fn default_backend_timeout() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default location of the configuration file.
#[must_use]
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "receipt-gate")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("receipt-gate.toml"))
}

impl ChainConfig {
    /// Network identity advertised to callers.
    #[must_use]
    pub fn network(&self) -> NetworkInfo {
        NetworkInfo {
            slug: self.network_slug.clone(),
            display_name: self.network_name.clone(),
            chain_id: self.chain_id,
        }
    }

    /// Settings for the JSON-RPC receipt source.
    #[must_use]
    pub fn rpc(&self) -> JsonRpcConfig {
        JsonRpcConfig {
            url: self.rpc_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

impl PaymentConfig {
    /// The requirement every protected request must satisfy.
    ///
    /// # Errors
    ///
    /// Returns an error if `price` cannot be expressed in smallest units.
    pub fn requirement(&self) -> crate::Result<PaymentRequirement> {
        let minimum_amount = to_smallest_unit(&self.price, self.decimals)
            .map_err(|e| crate::Error::Config(format!("payment.price: {e}")))?;
        Ok(PaymentRequirement::new(
            self.token_address,
            self.recipient_address,
            minimum_amount,
        ))
    }

    /// Human readable price, e.g. `1 CAT`.
    #[must_use]
    pub fn display_price(&self) -> String {
        format!("{} {}", self.price, self.token_symbol)
    }
}

impl GateConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Settings for the payment verifier.
    #[must_use]
    pub fn verifier(&self) -> PaymentVerifierConfig {
        PaymentVerifierConfig {
            network: self.chain.network(),
            retry_failed_transactions: self.payment.retry_failed_transactions,
        }
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first problem found.
    pub fn validate(&self) -> crate::Result<()> {
        self.payment.requirement()?;
        if self.payment.recipient_address == Address::ZERO {
            return Err(crate::Error::Config(
                "payment.recipient_address must not be the zero address".to_string(),
            ));
        }
        if !self.chain.rpc_url.starts_with("http://") && !self.chain.rpc_url.starts_with("https://") {
            return Err(crate::Error::Config(format!(
                "chain.rpc_url must be an http(s) URL: {}",
                self.chain.rpc_url
            )));
        }
        Ok(())
    }
}
