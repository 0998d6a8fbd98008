//! Payment requirements and the instructions handed to unpaid callers.

use alloy_primitives::{Address, U256};
use serde::Serialize;
use std::fmt;

/// Identity of the chain payments must be made on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Short machine name (e.g. `shardeum`).
    pub slug: String,
    /// Human readable name (e.g. `Shardeum EVM Testnet`).
    pub display_name: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
}

impl NetworkInfo {
    /// Network identity as advertised to clients, e.g. `shardeum-8119`.
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}-{}", self.slug, self.chain_id)
    }
}

/// What a caller must have paid to be admitted.
///
/// Immutable for the lifetime of the process; one per protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequirement {
    /// Contract of the fungible token that must move.
    pub token_address: Address,
    /// Beneficiary of the transfer.
    pub recipient_address: Address,
    /// Smallest acceptable amount, in the token's smallest unit.
    pub minimum_amount: U256,
}

impl PaymentRequirement {
    /// Create a requirement.
    #[must_use]
    pub fn new(token_address: Address, recipient_address: Address, minimum_amount: U256) -> Self {
        Self {
            token_address,
            recipient_address,
            minimum_amount,
        }
    }

    /// Everything a client needs to construct the on-chain transfer.
    #[must_use]
    pub fn instructions(&self, network: &NetworkInfo) -> PaymentInstructions {
        PaymentInstructions {
            network: network.identity(),
            chain_id: network.chain_id,
            token: self.token_address,
            amount: self.minimum_amount,
            recipient: self.recipient_address,
        }
    }
}

/// Machine-readable payment instructions returned with a 402.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstructions {
    /// Network identity (`<slug>-<chain id>`).
    pub network: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Token contract address.
    pub token: Address,
    /// Required amount in smallest units.
    #[serde(serialize_with = "serialize_decimal")]
    pub amount: U256,
    /// Recipient address.
    pub recipient: Address,
}

pub(crate) fn serialize_decimal<S: serde::Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(v)
}

/// A decimal token amount could not be converted to smallest units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// Not a plain non-negative decimal number.
    #[error("not a decimal amount: {0:?}")]
    Invalid(String),
    /// More fractional digits than the token has decimals.
    #[error("{amount} has more than {decimals} fractional digits")]
    TooPrecise {
        /// The amount as written.
        amount: String,
        /// Token decimals.
        decimals: u8,
    },
    /// The result does not fit in 256 bits.
    #[error("amount overflows 256 bits: {0}")]
    Overflow(String),
}

/// Convert a whole-token decimal amount (`"1"`, `"0.25"`) into smallest
/// units by applying `decimals`.
///
/// # Errors
///
/// Returns an [`AmountError`] if the string is not a plain decimal, carries
/// more fractional digits than `decimals`, or overflows.
pub fn to_smallest_unit(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let amount = amount.trim();
    let invalid = || AmountError::Invalid(amount.to_string());

    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let frac = frac.trim_end_matches('0');
    if frac.len() > usize::from(decimals) {
        return Err(AmountError::TooPrecise {
            amount: amount.to_string(),
            decimals,
        });
    }

    let padding = usize::from(decimals) - frac.len();
    let digits = format!("{whole}{frac}{}", "0".repeat(padding));
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 10).map_err(|_| AmountError::Overflow(amount.to_string()))
}

impl fmt::Display for PaymentRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of token {} to {}",
            self.minimum_amount, self.token_address, self.recipient_address
        )
    }
}
