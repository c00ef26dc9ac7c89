//! # Proof Key for Code Exchange
//!
//! [RFC 7636] verifier and challenge generation. Only the `S256` challenge
//! method is supported; `plain` is rejected at the authorization endpoint.
//!
//! [RFC 7636]: https://www.rfc-editor.org/rfc/rfc7636.html

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a high-entropy code verifier: 43 characters of base64url, from
/// 32 random octets, per RFC 7636 §4.1.
#[must_use]
pub fn code_verifier() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Compute the `S256` code challenge for a verifier:
/// `BASE64URL(SHA-256(verifier))`.
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    Base64UrlUnpadded::encode_string(&hash)
}

/// Check a verifier against a previously issued challenge.
#[must_use]
pub fn verify(verifier: &str, challenge: &str) -> bool {
    code_challenge(verifier) == challenge
}
