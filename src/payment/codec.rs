//! ERC-20 `Transfer` event decoding.
//!
//! Pure byte-layout logic, independent of how receipts are fetched:
//!
//! ```text
//! topics[0]  keccak256("Transfer(address,address,uint256)")
//! topics[1]  sender     (20-byte address, left-padded with zeros to 32 bytes)
//! topics[2]  recipient  (same layout)
//! data       amount     (big-endian unsigned integer, 32 bytes)
//! ```
//!
//! Topics arrive as raw bytes. A topic that is not exactly one word is
//! treated as absent rather than failing the whole receipt.

use crate::payment::receipt::LogEntry;
use alloy_primitives::{b256, Address, Bytes, B256, U256};

/// `keccak256("Transfer(address,address,uint256)")`.
pub const TRANSFER_EVENT_SIGNATURE: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// Size of a single ABI word.
const WORD_LEN: usize = 32;

/// A log entry decoded as a token transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    /// Token contract that emitted the event.
    pub token: Address,
    /// Sender, if the topic is present. Not checked by the gate.
    pub from: Option<Address>,
    /// Recipient.
    pub to: Address,
    /// Amount in the token's smallest unit.
    pub amount: U256,
}

/// Why a log entry could not be decoded as a transfer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The first topic is not the transfer signature.
    #[error("log is not a Transfer event")]
    NotTransfer,
    /// The recipient topic is missing or not a 32-byte word.
    #[error("Transfer log has no 32-byte recipient topic")]
    MissingRecipient,
    /// The data field is empty or wider than one word.
    #[error("Transfer amount must be 1..=32 bytes, got {0}")]
    MalformedAmount(usize),
}

/// Whether `log` is a transfer event emitted by `token`.
#[must_use]
pub fn is_transfer_from(log: &LogEntry, token: &Address) -> bool {
    log.address == *token && is_transfer_signature(log)
}

fn is_transfer_signature(log: &LogEntry) -> bool {
    log.topics
        .first()
        .is_some_and(|topic| topic.as_ref() == TRANSFER_EVENT_SIGNATURE.as_slice())
}

/// Recover an address from an indexed topic (its last 20 bytes).
///
/// Returns `None` unless the topic is exactly one word.
#[must_use]
pub fn decode_address_topic(topic: &[u8]) -> Option<Address> {
    (topic.len() == WORD_LEN).then(|| Address::from_word(B256::from_slice(topic)))
}

/// Encode a word as a raw topic.
#[must_use]
pub fn word_topic(word: B256) -> Bytes {
    Bytes::copy_from_slice(word.as_slice())
}

/// Decode a big-endian unsigned amount.
///
/// # Errors
///
/// Returns [`CodecError::MalformedAmount`] if `data` is empty or longer than
/// 32 bytes.
pub fn decode_amount(data: &[u8]) -> Result<U256, CodecError> {
    if data.is_empty() || data.len() > WORD_LEN {
        return Err(CodecError::MalformedAmount(data.len()));
    }
    Ok(U256::from_be_slice(data))
}

impl TransferEvent {
    /// Decode a log entry as a transfer.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the log is not a transfer or its recipient
    /// or amount cannot be decoded.
    pub fn decode(log: &LogEntry) -> Result<Self, CodecError> {
        if !is_transfer_signature(log) {
            return Err(CodecError::NotTransfer);
        }

        let to = log
            .topics
            .get(2)
            .and_then(|topic| decode_address_topic(topic))
            .ok_or(CodecError::MissingRecipient)?;
        let amount = decode_amount(&log.data)?;

        Ok(Self {
            token: log.address,
            from: log.topics.get(1).and_then(|topic| decode_address_topic(topic)),
            to,
            amount,
        })
    }
}
