//! # Random Identifier Generation
//!
//! Opaque, URL-safe identifiers and secrets used across the identity and
//! collaboration cores.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::Rng;

/// Generate a URL-safe token for keying short-lived state records
/// (OAuth `state`, SAML relay state, session URIs).
#[must_use]
pub fn uri_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Generate a high-entropy nonce for embedding in signed token claims.
#[must_use]
pub fn nonce() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Generate an authorization code. Only the test identity provider mints
/// codes locally; real providers supply their own.
#[must_use]
pub fn auth_code() -> String {
    let bytes: [u8; 24] = rand::rng().random();
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Generate a random SAML request id. XML `ID` attributes must not begin
/// with a digit, so the value carries a fixed prefix.
#[must_use]
pub fn request_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    format!("id-{}", Base64UrlUnpadded::encode_string(&bytes))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tokens_unique() {
        assert_ne!(uri_token(), uri_token());
        assert_ne!(nonce(), nonce());
    }

    #[test]
    fn request_id_not_numeric_start() {
        assert!(request_id().starts_with("id-"));
    }
}
