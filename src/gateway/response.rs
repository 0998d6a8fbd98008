//! Mapping verification decisions onto HTTP responses.

use crate::payment::{Decision, PaymentInstructions, Rejection};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Header advertising the payment network identity.
pub const HEADER_PAYMENT_NETWORK: &str = "x-payment-network";
/// Header advertising the token contract.
pub const HEADER_PAYMENT_TOKEN: &str = "x-payment-token";
/// Header advertising the required amount in smallest units.
pub const HEADER_PAYMENT_AMOUNT: &str = "x-payment-amount";
/// Header advertising the payment recipient.
pub const HEADER_PAYMENT_RECIPIENT: &str = "x-payment-recipient";

/// Presentation details for payment-required messages.
#[derive(Debug, Clone)]
pub struct PriceTag {
    /// Price as shown to humans, e.g. `1 CAT`.
    pub display_price: String,
    /// Network as shown to humans.
    pub network_name: String,
}

fn payment_headers(instructions: &PaymentInstructions) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let values = [
        (HEADER_PAYMENT_NETWORK, instructions.network.clone()),
        (HEADER_PAYMENT_TOKEN, instructions.token.to_string()),
        (HEADER_PAYMENT_AMOUNT, instructions.amount.to_string()),
        (HEADER_PAYMENT_RECIPIENT, instructions.recipient.to_string()),
    ];
    for (name, value) in values {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    headers
}

fn rejection_body(rejection: &Rejection, price: &PriceTag) -> Value {
    let code = rejection.code();
    match rejection {
        Rejection::PaymentRequired(instructions) => json!({
            "error": "Payment Required",
            "code": code,
            "message": format!(
                "Please pay {} to {} on {}",
                price.display_price, instructions.recipient, price.network_name
            ),
            "payment": instructions,
        }),
        Rejection::InvalidProofFormat => json!({ "error": "Invalid Payment Proof", "code": code }),
        Rejection::ProofAlreadyUsed => json!({ "error": "Transaction already used", "code": code }),
        Rejection::TransactionFailed => {
            json!({ "error": "Payment Transaction Failed", "code": code })
        }
        Rejection::WrongOrMissingToken => json!({ "error": "Invalid Payment Token", "code": code }),
        Rejection::WrongRecipient { .. } => json!({ "error": "Wrong Recipient", "code": code }),
        Rejection::InsufficientPayment { paid, required } => json!({
            "error": "Insufficient Payment",
            "code": code,
            "paid": paid.to_string(),
            "required": required.to_string(),
        }),
        Rejection::MalformedTransferLog(e) => json!({
            "error": "Malformed Transfer Event",
            "code": code,
            "details": e.to_string(),
        }),
    }
}

/// HTTP status for a rejection.
#[must_use]
pub fn rejection_status(rejection: &Rejection) -> StatusCode {
    match rejection {
        Rejection::ProofAlreadyUsed => StatusCode::FORBIDDEN,
        _ => StatusCode::PAYMENT_REQUIRED,
    }
}

/// Render a non-admitting decision.
///
/// Returns `None` for [`Decision::Admit`]: the protected operation answers
/// instead. Every 402 carries the payment headers so a caller can correct
/// its payment without another round trip.
#[must_use]
pub fn decision_response(
    decision: &Decision,
    instructions: &PaymentInstructions,
    price: &PriceTag,
) -> Option<Response> {
    match decision {
        Decision::Admit(_) => None,
        Decision::Reject(rejection) => {
            let status = rejection_status(rejection);
            let body = Json(rejection_body(rejection, price));
            if status == StatusCode::PAYMENT_REQUIRED {
                Some((status, payment_headers(instructions), body).into_response())
            } else {
                Some((status, body).into_response())
            }
        }
        Decision::Error(e) => Some(
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal Payment Verification Error",
                    "code": e.code(),
                })),
            )
                .into_response(),
        ),
    }
}
