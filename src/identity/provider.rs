//! # Identity Providers
//!
//! Traits implemented by the embedding service to supply the identity core
//! with configuration, storage, outbound provider calls, and signing keys.
//! The core holds no connections and opens no sockets of its own; every
//! external effect passes through one of these traits.

use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::identity::types::{IdentityConfig, IdpTokens, IssuedToken, Principal, Profile};
use crate::oauth::ProviderConfig;

/// Identity Provider trait.
pub trait Provider:
    Metadata + StateStore + Blocklist + Subject + Idp + Keyring + Clone
{
}

/// A blanket implementation for `Provider` trait so that any type
/// implementing the required super traits is considered a `Provider`.
impl<T> Provider for T where T: Metadata + StateStore + Blocklist + Subject + Idp + Keyring + Clone {}

/// The `Metadata` trait supplies provider registrations and identity
/// configuration, read once at startup.
pub trait Metadata: Send + Sync {
    /// All configured provider registrations.
    fn providers(&self) -> impl Future<Output = Result<Vec<ProviderConfig>>> + Send;

    /// The registration for one provider.
    fn provider(&self, provider_id: &str) -> impl Future<Output = Result<ProviderConfig>> + Send;

    /// Identity configuration: token lifetimes, provider timeouts, SP
    /// metadata.
    fn config(&self) -> impl Future<Output = Result<IdentityConfig>> + Send;
}

/// `StateStore` is used to store and retrieve TTL-bearing state records
/// (PKCE verifiers, relay state, token records).
pub trait StateStore: Send + Sync {
    /// Store state using the provided key, discarding it at `expires_at`.
    fn put(
        &self, key: &str, state: &(impl Serialize + Sync), expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Retrieve state using the provided key. Absent or expired records
    /// are errors.
    fn get<T: DeserializeOwned>(&self, key: &str) -> impl Future<Output = Result<T>> + Send;

    /// Remove state using the provided key.
    fn purge(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// `Blocklist` records revoked token fingerprints. Entries expire with the
/// underlying token's TTL, so no sweeper is needed.
pub trait Blocklist: Send + Sync {
    /// Add a fingerprint, atomically, keeping it until `expires_at`.
    /// Adding an already-present fingerprint is a no-op.
    fn block(
        &self, fingerprint: &str, expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Whether a fingerprint is currently blocked.
    fn blocked(&self, fingerprint: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// `Subject` persists principal records and the per-principal index of
/// live token fingerprints.
pub trait Subject: Send + Sync {
    /// Create or update the principal identified by
    /// `(provider, provider_id)`, returning the stored record. The
    /// internal id is assigned on first sight and never changes; name,
    /// email, and groups are refreshed on every login.
    fn upsert(&self, principal: &Principal) -> impl Future<Output = Result<Principal>> + Send;

    /// Look up a principal by internal id.
    fn principal(&self, id: Uuid) -> impl Future<Output = Result<Option<Principal>>> + Send;

    /// Record a minted token fingerprint against its principal.
    fn record_token(
        &self, principal_id: Uuid, token: &IssuedToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// All recorded fingerprints for a principal, expired ones included.
    fn issued_tokens(
        &self, principal_id: Uuid,
    ) -> impl Future<Output = Result<Vec<IssuedToken>>> + Send;
}

/// `Idp` performs the outbound HTTP legs of a federated login. These are
/// the only network calls the core ever triggers; the handler bounds them
/// with the configured provider timeout.
pub trait Idp: Send + Sync {
    /// Exchange an authorization code (with its PKCE verifier) at the
    /// provider's token endpoint.
    fn exchange_code(
        &self, provider: &ProviderConfig, code: &str, verifier: &str,
    ) -> impl Future<Output = Result<IdpTokens>> + Send;

    /// Fetch the user profile with the provider-issued access token.
    fn fetch_profile(
        &self, provider: &ProviderConfig, access_token: &str,
    ) -> impl Future<Output = Result<Profile>> + Send;
}

/// `Keyring` supplies the Ed25519 key pair used to sign and verify bearer
/// tokens.
pub trait Keyring: Send + Sync {
    /// The signing key.
    fn signing_key(&self) -> impl Future<Output = Result<SigningKey>> + Send;

    /// The verifying key.
    fn verifying_key(&self) -> impl Future<Output = Result<VerifyingKey>> + Send;
}
