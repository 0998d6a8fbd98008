//! Proof tokens: caller-supplied transaction hashes.

use alloy_primitives::B256;
use std::fmt;
use std::str::FromStr;

/// Length of a transaction hash in hex digits, without the `0x` prefix.
const TX_HASH_HEX_LEN: usize = 64;

/// A syntactically valid transaction hash claimed to be a payment.
///
/// Two spellings of the same hash (differing only in letter case) are the
/// same token, so replay protection cannot be bypassed by re-casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProofToken(B256);

/// A raw credential did not look like a transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed transaction hash: expected 0x followed by 64 hex digits")]
pub struct MalformedProof;

impl ProofToken {
    /// Parse a raw credential into a proof token.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedProof`] unless `raw` is `0x` followed by exactly
    /// 64 hexadecimal digits.
    pub fn parse(raw: &str) -> Result<Self, MalformedProof> {
        let digits = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .ok_or(MalformedProof)?;

        if digits.len() != TX_HASH_HEX_LEN || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MalformedProof);
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| MalformedProof)?;
        Ok(Self(B256::from(bytes)))
    }

    /// The transaction hash.
    #[must_use]
    pub fn tx_hash(&self) -> B256 {
        self.0
    }
}

impl From<B256> for ProofToken {
    fn from(hash: B256) -> Self {
        Self(hash)
    }
}

impl FromStr for ProofToken {
    type Err = MalformedProof;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProofToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
