//! Payment verifier: turns a proof and a requirement into a [`Decision`].
//!
//! This is the core of the gate. Steps, short-circuiting on the first
//! outcome:
//!
//! 1. no credential → `PaymentRequired` (with payment instructions)
//! 2. malformed hash → `InvalidProofFormat`
//! 3. atomically reserve the proof → `ProofAlreadyUsed` if taken
//! 4. fetch the receipt → `Error(VerificationUnavailable)` on failure
//! 5. non-success status → `TransactionFailed`
//! 6. find the first Transfer log emitted by the token → `WrongOrMissingToken`
//! 7. compare recipient → `WrongRecipient`
//! 8. compare amount → `InsufficientPayment`
//! 9. confirm the reservation → `Admit`
//!
//! The reservation is released on every path except `Admit` (and, unless
//! configured otherwise, `TransactionFailed`). Release happens in `Drop`, so
//! it also covers a caller dropping the verification future mid-fetch.

use crate::payment::codec::{self, CodecError, TransferEvent};
use crate::payment::proof::ProofToken;
use crate::payment::receipt::{ChainReceipt, ReceiptSource};
use crate::payment::requirement::{NetworkInfo, PaymentInstructions, PaymentRequirement};
use crate::payment::store::{ProofStore, StoreStats};
use alloy_primitives::{Address, U256};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for the payment verifier.
#[derive(Debug, Clone)]
pub struct PaymentVerifierConfig {
    /// Chain payments must be made on, advertised in payment instructions.
    pub network: NetworkInfo,
    /// Whether a hash whose transaction failed on-chain may be submitted
    /// again. When `false`, a failed transaction spends its hash.
    pub retry_failed_transactions: bool,
}

/// Outcome of a verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The proof is valid and now spent; let the request through.
    Admit(Admission),
    /// The caller must fix something.
    Reject(Rejection),
    /// The gate could not decide; the same proof may be retried.
    Error(VerificationError),
}

/// Details of an admitted payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// The proof that is now spent.
    pub proof: ProofToken,
    /// Amount actually transferred.
    pub paid: U256,
}

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// No credential was supplied.
    #[error("payment required")]
    PaymentRequired(PaymentInstructions),
    /// The credential is not a transaction hash.
    #[error("invalid payment proof format")]
    InvalidProofFormat,
    /// The proof has already been used (or is being verified right now).
    #[error("transaction already used")]
    ProofAlreadyUsed,
    /// The transaction did not execute successfully.
    #[error("payment transaction failed")]
    TransactionFailed,
    /// No Transfer event from the required token contract.
    #[error("invalid payment token")]
    WrongOrMissingToken,
    /// The transfer went to someone else.
    #[error("wrong recipient")]
    WrongRecipient {
        /// Recipient found in the log, if decodable.
        found: Option<Address>,
    },
    /// The transfer was too small.
    #[error("insufficient payment: paid {paid}, required {required}")]
    InsufficientPayment {
        /// Amount transferred.
        paid: U256,
        /// Amount required.
        required: U256,
    },
    /// The Transfer event could not be decoded.
    #[error("malformed transfer event: {0}")]
    MalformedTransferLog(CodecError),
}

impl Rejection {
    /// Stable machine-readable reason code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PaymentRequired(_) => "payment_required",
            Self::InvalidProofFormat => "invalid_proof_format",
            Self::ProofAlreadyUsed => "proof_already_used",
            Self::TransactionFailed => "transaction_failed",
            Self::WrongOrMissingToken => "wrong_or_missing_token",
            Self::WrongRecipient { .. } => "wrong_recipient",
            Self::InsufficientPayment { .. } => "insufficient_payment",
            Self::MalformedTransferLog(_) => "malformed_transfer_log",
        }
    }
}

/// Verification could not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// The receipt could not be fetched.
    #[error("payment verification unavailable: {0}")]
    VerificationUnavailable(String),
}

impl VerificationError {
    /// Stable machine-readable reason code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::VerificationUnavailable(_) => "verification_unavailable",
        }
    }
}

/// Verifier statistics for monitoring.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct VerifierStats {
    /// Requests admitted.
    pub admitted: u64,
    /// Requests rejected (including first-contact `PaymentRequired`).
    pub rejected: u64,
    /// Verifications that could not complete.
    pub errors: u64,
}

/// A provisional claim on a proof in the store.
///
/// Released on drop unless confirmed.
struct Reservation<'a> {
    store: &'a dyn ProofStore,
    proof: ProofToken,
    armed: bool,
}

impl<'a> Reservation<'a> {
    fn acquire(store: &'a dyn ProofStore, proof: ProofToken) -> Option<Self> {
        store.insert_if_absent(proof).then(|| Self {
            store,
            proof,
            armed: true,
        })
    }

    /// Keep the proof in the store permanently.
    fn confirm(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.remove(&self.proof);
            debug!("Released reservation for {}", self.proof);
        }
    }
}

/// Validate a successful receipt against a requirement.
///
/// Returns the transferred amount on success. Only the first Transfer log
/// emitted by the required token is considered.
///
/// # Errors
///
/// Returns the [`Rejection`] describing the first check that failed.
pub fn check_transfer(
    receipt: &ChainReceipt,
    requirement: &PaymentRequirement,
) -> Result<U256, Rejection> {
    let log = receipt
        .logs
        .iter()
        .find(|log| codec::is_transfer_from(log, &requirement.token_address))
        .ok_or(Rejection::WrongOrMissingToken)?;

    let event = TransferEvent::decode(log).map_err(|e| match e {
        CodecError::MissingRecipient => Rejection::WrongRecipient { found: None },
        other => Rejection::MalformedTransferLog(other),
    })?;

    // Address equality is byte equality, so letter case never matters.
    if event.to != requirement.recipient_address {
        return Err(Rejection::WrongRecipient {
            found: Some(event.to),
        });
    }
    if event.amount < requirement.minimum_amount {
        return Err(Rejection::InsufficientPayment {
            paid: event.amount,
            required: requirement.minimum_amount,
        });
    }

    Ok(event.amount)
}

/// Payment verifier with replay protection.
pub struct PaymentVerifier {
    receipts: Arc<dyn ReceiptSource>,
    store: Arc<dyn ProofStore>,
    config: PaymentVerifierConfig,
    stats: Mutex<VerifierStats>,
}

impl PaymentVerifier {
    /// Create a verifier over the given receipt source and proof store.
    #[must_use]
    pub fn new(
        config: PaymentVerifierConfig,
        receipts: Arc<dyn ReceiptSource>,
        store: Arc<dyn ProofStore>,
    ) -> Self {
        info!(
            "Payment verifier initialized (network={}, retry_failed_transactions={})",
            config.network.identity(),
            config.retry_failed_transactions
        );
        Self {
            receipts,
            store,
            config,
            stats: Mutex::new(VerifierStats::default()),
        }
    }

    /// The network payments are expected on.
    #[must_use]
    pub fn network(&self) -> &NetworkInfo {
        &self.config.network
    }

    /// Get verifier statistics.
    #[must_use]
    pub fn stats(&self) -> VerifierStats {
        self.stats.lock().clone()
    }

    /// Get used-proof store statistics.
    #[must_use]
    pub fn store_stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Decide whether `credential` pays for `requirement`.
    ///
    /// `credential` is the raw proof as extracted from the request, or
    /// `None` if the caller supplied none. Only an `Admit` spends the proof.
    pub async fn verify(
        &self,
        credential: Option<&str>,
        requirement: &PaymentRequirement,
    ) -> Decision {
        let decision = self.decide(credential, requirement).await;

        let mut stats = self.stats.lock();
        match &decision {
            Decision::Admit(_) => stats.admitted += 1,
            Decision::Reject(_) => stats.rejected += 1,
            Decision::Error(_) => stats.errors += 1,
        }
        drop(stats);

        decision
    }

    async fn decide(&self, credential: Option<&str>, requirement: &PaymentRequirement) -> Decision {
        let Some(raw) = credential else {
            debug!("No payment proof supplied");
            return Decision::Reject(Rejection::PaymentRequired(
                requirement.instructions(&self.config.network),
            ));
        };

        let Ok(proof) = ProofToken::parse(raw) else {
            debug!("Malformed payment proof: {raw:?}");
            return Decision::Reject(Rejection::InvalidProofFormat);
        };

        let Some(reservation) = Reservation::acquire(self.store.as_ref(), proof) else {
            info!("Rejected replay of {proof}");
            return Decision::Reject(Rejection::ProofAlreadyUsed);
        };

        let receipt = match self.receipts.transaction_receipt(&proof).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Receipt lookup failed for {proof}: {e}");
                return Decision::Error(VerificationError::VerificationUnavailable(e.to_string()));
            }
        };

        if !receipt.succeeded() {
            info!("Transaction {proof} failed on-chain");
            if !self.config.retry_failed_transactions {
                reservation.confirm();
            }
            return Decision::Reject(Rejection::TransactionFailed);
        }

        match check_transfer(&receipt, requirement) {
            Ok(paid) => {
                reservation.confirm();
                info!("Admitted {proof} (paid {paid})");
                Decision::Admit(Admission { proof, paid })
            }
            Err(rejection) => {
                info!("Rejected {proof}: {rejection}");
                Decision::Reject(rejection)
            }
        }
    }
}
