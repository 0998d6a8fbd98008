//! Gate event system.

use tokio::sync::broadcast;

/// Events emitted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// Gateway is accepting requests.
    Started {
        /// Bound address.
        address: String,
    },

    /// Gateway is shutting down.
    ShuttingDown,

    /// A payment was verified and the request let through.
    PaymentAdmitted {
        /// Spent transaction hash.
        proof: String,
        /// Amount paid, in smallest units.
        amount: String,
    },

    /// A request was turned away.
    PaymentRejected {
        /// Transaction hash, if one was presented.
        proof: Option<String>,
        /// Reason code.
        reason: String,
    },

    /// A payment could not be verified (chain endpoint trouble).
    VerificationFailed {
        /// Transaction hash.
        proof: Option<String>,
        /// Error message.
        message: String,
    },
}

/// Channel for receiving gate events.
pub type GateEventsChannel = broadcast::Receiver<GateEvent>;

/// Sender for gate events.
pub type GateEventsSender = broadcast::Sender<GateEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (GateEventsSender, GateEventsChannel) {
    broadcast::channel(256)
}
