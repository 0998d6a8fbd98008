//! Error types for receipt-gate.
//!
//! Payment verification outcomes are not errors: a rejected proof is a
//! [`Decision`](crate::payment::Decision). These variants cover the
//! infrastructure underneath the gate.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in receipt-gate.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The chain RPC endpoint failed or returned something unusable.
    #[error("chain rpc error: {0}")]
    Rpc(String),

    /// The metered backend failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// The HTTP server failed.
    #[error("server error: {0}")]
    Server(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Rpc(format!("request timed out: {e}"))
        } else {
            Self::Rpc(e.to_string())
        }
    }
}
