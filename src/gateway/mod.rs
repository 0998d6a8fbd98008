//! HTTP gateway in front of the metered backend.
//!
//! Routes:
//!
//! - `GET /api/ai`: service description and payment instructions
//! - `POST /api/ai`: paid generation (`Authorization: Token <tx-hash>`)
//! - `GET /health`: liveness, verifier and used-proof store counters
//!
//! Status codes: 402 for missing or unacceptable payment (with
//! `x-payment-*` headers), 403 for a reused proof, 500 when the chain
//! cannot be queried.

mod response;
mod routes;
mod server;

pub use response::{
    decision_response, rejection_status, PriceTag, HEADER_PAYMENT_AMOUNT, HEADER_PAYMENT_NETWORK,
    HEADER_PAYMENT_RECIPIENT, HEADER_PAYMENT_TOKEN,
};
pub use routes::{parse_generate_request, router, GatewayState, GenerateRequest, AI_ENDPOINT};
pub use server::{GatewayBuilder, RunningGateway, ShutdownHandle};
