//! State is used by the library to persist flow information between the
//! authorization and callback legs of a login, and to index minted tokens
//! for introspection and bulk revocation.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifetimes for interim state records.
pub enum Expire {
    /// PKCE verifier and OAuth `state` records.
    Authorization,

    /// SAML relay state records.
    Relay,
}

impl Expire {
    /// The TTL for this record kind.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        match self {
            Self::Authorization | Self::Relay => TimeDelta::try_minutes(5).unwrap_or_default(),
        }
    }
}

/// Interim record for an in-flight OAuth authorization, keyed by `state`.
/// Single use: the callback consumes it.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthState {
    /// The time this record should expire.
    pub expires_at: DateTime<Utc>,

    /// Provider the flow was started against.
    pub provider: String,

    /// PKCE code verifier.
    pub verifier: String,

    /// Requested scopes.
    pub scope: String,

    /// Registered client callback, when supplied.
    pub client_callback: Option<String>,

    /// Login hint forwarded to the provider.
    pub login_hint: Option<String>,
}

impl AuthState {
    /// Determines whether the record has expired.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires_at.signed_duration_since(Utc::now()).num_seconds() < 0
    }
}

/// Interim record for an in-flight SAML login, keyed by relay state.
/// Single use: the assertion consumer consumes it.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RelayState {
    /// The time this record should expire.
    pub expires_at: DateTime<Utc>,

    /// Provider the flow was started against.
    pub provider: String,

    /// `ID` of the `AuthnRequest`; the assertion's `InResponseTo` must
    /// match.
    pub request_id: String,

    /// Registered client callback, when supplied.
    pub client_callback: Option<String>,
}

impl RelayState {
    /// Determines whether the record has expired.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires_at.signed_duration_since(Utc::now()).num_seconds() < 0
    }
}

/// Record written under a token's fingerprint at mint, with TTL equal to
/// the token lifetime.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TokenRecord {
    /// Owning principal.
    pub principal_id: Uuid,

    /// `access` or `refresh`.
    pub kind: String,

    /// Issue time.
    pub issued_at: DateTime<Utc>,

    /// Natural expiry.
    pub expires_at: DateTime<Utc>,
}

/// Key under which a token record is stored.
#[must_use]
pub fn token_key(fingerprint: &str) -> String {
    format!("token:{fingerprint}")
}

/// Key under which an in-flight OAuth authorization is stored.
#[must_use]
pub fn auth_key(state: &str) -> String {
    format!("auth:{state}")
}

/// Key under which an in-flight SAML login is stored.
#[must_use]
pub fn relay_key(relay_state: &str) -> String {
    format!("relay:{relay_state}")
}
