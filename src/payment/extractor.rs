//! Proof extraction from the `Authorization` header.
//!
//! Accepts `Authorization: Token <tx-hash>`. Anything else means the caller
//! supplied no credential. Format validation of the hash itself happens in
//! the verifier so that a badly formed hash is reported as such instead of
//! being treated as first contact.

/// Authorization scheme carrying a payment proof.
pub const PROOF_SCHEME: &str = "Token";

/// Extract the raw proof credential from an `Authorization` header value.
///
/// Returns `None` when the header is absent, uses another scheme, or carries
/// nothing after the scheme.
#[must_use]
pub fn extract_proof(authorization: Option<&str>) -> Option<&str> {
    let rest = authorization?
        .strip_prefix(PROOF_SCHEME)?
        .strip_prefix(' ')?;
    rest.split_whitespace().next()
}
