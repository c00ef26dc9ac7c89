//! # Bearer Tokens
//!
//! Minting, validation, and revocation of the service's own bearer tokens.
//! A token is a signed structured value: base64url claims, a dot, and an
//! Ed25519 signature over the encoded claims. Callers treat it as opaque.
//!
//! Revocation is a blocklist of token fingerprints, each entry expiring
//! with the underlying token's remaining lifetime, so no sweeper is
//! needed.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identity::provider::{Blocklist, Keyring, Metadata, StateStore, Subject};
use crate::identity::state::{TokenRecord, token_key};
use crate::identity::types::{IssuedToken, Principal};
use crate::oauth::TokenGrant;
use crate::{core::generate, server};

/// Signed claims carried by every token.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Claims {
    /// Principal the token was issued to.
    pub sub: Uuid,

    /// Issue time, seconds since the epoch.
    pub iat: i64,

    /// Expiry time, seconds since the epoch.
    pub exp: i64,

    /// Uniqueness nonce; two tokens minted in the same second differ.
    pub nonce: String,

    /// Access or refresh.
    pub kind: TokenKind,
}

impl Claims {
    /// Whether the claims have passed their expiry.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// Token kinds. Refresh tokens are longer-lived and single use on
/// exchange.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived bearer token presented on every request.
    #[default]
    Access,

    /// Long-lived token exchanged for a fresh pair.
    Refresh,
}

impl TokenKind {
    /// Wire name for token records and introspection.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// The lifecycle position of a presented token. Only introspection
/// distinguishes these; every other caller sees `unauthorized`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// Signature good, within TTL, not blocked.
    Active(Claims),

    /// Signature good, TTL elapsed.
    Expired(Claims),

    /// Signature good, fingerprint blocked.
    Revoked(Claims),

    /// Fails parsing or signature verification.
    Invalid,
}

/// SHA-256 fingerprint of a full token, used as the blocklist and token
/// record key.
#[must_use]
pub fn fingerprint(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    Base64UrlUnpadded::encode_string(&hash)
}

/// Mint an access/refresh token pair for a principal, writing token
/// records (TTL = lifetime) and the per-principal fingerprint index.
///
/// # Errors
///
/// Returns `server_error` when the keyring or stores are unavailable.
pub async fn mint(
    provider: &(impl Keyring + Metadata + StateStore + Subject), principal: &Principal,
) -> Result<TokenGrant> {
    let config = Metadata::config(provider).await.map_err(|e| server!("issue getting config: {e}"))?;
    let now = Utc::now();

    let access = sign_claims(
        provider,
        &Claims {
            sub: principal.id,
            iat: now.timestamp(),
            exp: (now + config.access_ttl()).timestamp(),
            nonce: generate::nonce(),
            kind: TokenKind::Access,
        },
    )
    .await?;
    let refresh = sign_claims(
        provider,
        &Claims {
            sub: principal.id,
            iat: now.timestamp(),
            exp: (now + config.refresh_ttl()).timestamp(),
            nonce: generate::nonce(),
            kind: TokenKind::Refresh,
        },
    )
    .await?;

    record(provider, principal.id, &access, TokenKind::Access, now, now + config.access_ttl())
        .await?;
    record(provider, principal.id, &refresh, TokenKind::Refresh, now, now + config.refresh_ttl())
        .await?;

    Ok(TokenGrant {
        access_token: access,
        token_type: "Bearer".to_string(),
        expires_in: config.access_ttl_secs,
        refresh_token: Some(refresh),
    })
}

async fn sign_claims(provider: &impl Keyring, claims: &Claims) -> Result<String> {
    let bytes = serde_json::to_vec(claims).map_err(|e| server!("issue serializing claims: {e}"))?;
    let encoded = Base64UrlUnpadded::encode_string(&bytes);

    let key = Keyring::signing_key(provider)
        .await
        .map_err(|e| server!("issue getting signing key: {e}"))?;
    let signature: Signature = key.sign(encoded.as_bytes());

    Ok(format!("{encoded}.{}", Base64UrlUnpadded::encode_string(&signature.to_bytes())))
}

async fn record(
    provider: &(impl StateStore + Subject), principal_id: Uuid, token: &str, kind: TokenKind,
    issued_at: DateTime<Utc>, expires_at: DateTime<Utc>,
) -> Result<()> {
    let fp = fingerprint(token);
    let record = TokenRecord {
        principal_id,
        kind: kind.as_str().to_string(),
        issued_at,
        expires_at,
    };
    StateStore::put(provider, &token_key(&fp), &record, expires_at)
        .await
        .map_err(|e| server!("issue saving token record: {e}"))?;
    Subject::record_token(provider, principal_id, &IssuedToken { fingerprint: fp, expires_at })
        .await
        .map_err(|e| server!("issue indexing token: {e}"))?;
    Ok(())
}

/// Classify a presented token: parse, verify the signature, check expiry,
/// then the blocklist.
///
/// # Errors
///
/// Returns `server_error` when the keyring or blocklist are unavailable.
pub async fn classify(
    provider: &(impl Keyring + Blocklist), token: &str,
) -> Result<TokenStatus> {
    let Some((encoded, sig)) = token.split_once('.') else {
        return Ok(TokenStatus::Invalid);
    };
    let Ok(sig_bytes) = Base64UrlUnpadded::decode_vec(sig) else {
        return Ok(TokenStatus::Invalid);
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return Ok(TokenStatus::Invalid);
    };

    let key = Keyring::verifying_key(provider)
        .await
        .map_err(|e| server!("issue getting verifying key: {e}"))?;
    if key.verify_strict(encoded.as_bytes(), &signature).is_err() {
        return Ok(TokenStatus::Invalid);
    }

    let Ok(bytes) = Base64UrlUnpadded::decode_vec(encoded) else {
        return Ok(TokenStatus::Invalid);
    };
    let Ok(claims) = serde_json::from_slice::<Claims>(&bytes) else {
        return Ok(TokenStatus::Invalid);
    };

    if claims.expired() {
        return Ok(TokenStatus::Expired(claims));
    }
    if Blocklist::blocked(provider, &fingerprint(token))
        .await
        .map_err(|e| server!("issue checking blocklist: {e}"))?
    {
        return Ok(TokenStatus::Revoked(claims));
    }

    Ok(TokenStatus::Active(claims))
}

/// Validate a presented token, returning its claims. Signature failures,
/// expiry, and revocation all surface as a single `unauthorized`.
///
/// # Errors
///
/// Returns `unauthorized` for any non-active token.
pub async fn validate(provider: &(impl Keyring + Blocklist), token: &str) -> Result<Claims> {
    match classify(provider, token).await? {
        TokenStatus::Active(claims) => Ok(claims),
        TokenStatus::Expired(_) | TokenStatus::Revoked(_) | TokenStatus::Invalid => {
            Err(Error::Unauthorized("invalid token".to_string()))
        }
    }
}

/// Validate that a presented token is an active token of the required
/// kind.
///
/// # Errors
///
/// Returns `unauthorized` for any non-active token or a kind mismatch.
pub async fn validate_kind(
    provider: &(impl Keyring + Blocklist), token: &str, kind: TokenKind,
) -> Result<Claims> {
    let claims = validate(provider, token).await?;
    if claims.kind != kind {
        return Err(Error::Unauthorized("invalid token".to_string()));
    }
    Ok(claims)
}

/// Blacklist a token for its remaining lifetime. Expired or unparseable
/// tokens are already dead; revoking them is a no-op.
///
/// # Errors
///
/// Returns `server_error` when the blocklist is unavailable.
pub async fn revoke(provider: &(impl Keyring + Blocklist), token: &str) -> Result<()> {
    match classify(provider, token).await? {
        TokenStatus::Active(claims) => {
            Blocklist::block(provider, &fingerprint(token), claims.expires_at())
                .await
                .map_err(|e| server!("issue blocking token: {e}"))
        }
        TokenStatus::Expired(_) | TokenStatus::Revoked(_) | TokenStatus::Invalid => Ok(()),
    }
}

/// Blacklist every live token recorded for a principal in a single pass.
/// Used when the principal is deleted.
///
/// # Errors
///
/// Returns `server_error` when the stores are unavailable.
pub async fn revoke_principal(
    provider: &(impl Blocklist + Subject), principal_id: Uuid,
) -> Result<()> {
    let issued = Subject::issued_tokens(provider, principal_id)
        .await
        .map_err(|e| server!("issue listing tokens: {e}"))?;

    let now = Utc::now();
    for token in issued {
        if token.expires_at > now {
            Blocklist::block(provider, &token.fingerprint, token.expires_at)
                .await
                .map_err(|e| server!("issue blocking token: {e}"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn claims_round_trip() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
            nonce: "n1".to_string(),
            kind: TokenKind::Access,
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert_eq!(serde_json::from_str::<Claims>(&json).unwrap(), claims);
    }

    #[test]
    fn fingerprint_stable() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
    }
}
