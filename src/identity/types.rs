//! # Identity Types
//!
//! Request and response types for the identity endpoints. The types
//! serialize to and from JSON in accordance with RFC 6749, RFC 7662, and
//! the SAML 2.0 bindings.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::oauth::{GrantType, ProviderKind, TokenGrant};

/// An authenticated acting party, human or service. The pair
/// `(provider, provider_id)` is globally unique and immutable; display name
/// and group memberships may change between logins.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Principal {
    /// Opaque internal identifier.
    pub id: Uuid,

    /// Name of the provider that authenticated this principal.
    pub provider: String,

    /// Provider-scoped identifier (email or subject).
    pub provider_id: String,

    /// Display name as most recently asserted by the provider.
    pub name: String,

    /// Email address, when the provider supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Provider-scoped group memberships, resolved at token issue.
    #[serde(default)]
    pub groups: BTreeSet<String>,

    /// Whether the principal is a human user or a service account.
    #[serde(default)]
    pub kind: PrincipalKind,
}

/// Principal kinds.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    /// A human user.
    #[default]
    User,

    /// A service account.
    Service,
}

/// A user profile as asserted by an external identity provider, before it
/// is mapped to a [`Principal`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Provider-scoped subject identifier.
    pub provider_id: String,

    /// Display name.
    pub name: String,

    /// Email address, when asserted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Group memberships, when asserted.
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

/// Tokens returned by an external provider's token endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IdpTokens {
    /// Provider access token, used to fetch the profile.
    pub access_token: String,

    /// Provider refresh token, unused by the core but carried through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// OIDC identity token, when the `openid` scope was granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// Request to list configured identity providers.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProvidersRequest;

/// Configured providers with the metadata needed to start a flow.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProvidersResponse {
    /// One entry per configured provider.
    pub providers: Vec<ProviderInfo>,
}

/// Public metadata for one configured provider.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProviderInfo {
    /// Provider identifier for the `idp` request parameter.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Protocol the provider speaks.
    pub kind: ProviderKind,

    /// Where the flow begins: the provider authorization endpoint (OAuth)
    /// or SSO URL (SAML).
    pub authorization_endpoint: String,
}

/// Request to begin an OAuth authorization flow.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizeRequest {
    /// Provider to federate to (`idp` query parameter).
    pub provider: String,

    /// Requested scopes, space-separated. Must contain `openid` for OIDC
    /// providers.
    pub scope: String,

    /// Caller-supplied correlation state. Generated server-side when
    /// absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Where to deliver tokens after the callback. Must fall under the
    /// provider registration's redirect prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_callback: Option<String>,

    /// Hint forwarded to the provider's login form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
}

/// Reply to an authorization request: a redirect to the provider.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthorizeResponse {
    /// Fully formed provider authorization URL, carrying the PKCE
    /// challenge and `state`.
    pub redirect: String,

    /// The correlation state the callback must present.
    pub state: String,
}

/// Provider callback parameters.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CallbackRequest {
    /// Authorization code issued by the provider.
    pub code: String,

    /// Correlation state from the matching authorization request.
    pub state: String,
}

/// Reply to a completed login: tokens are either returned directly or
/// appended to the registered client callback.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum CallbackResponse {
    /// Redirect to the client callback with the grant in the query string.
    #[serde(rename = "redirect")]
    Redirect(String),

    /// The token grant, returned as a JSON body.
    #[serde(rename = "grant")]
    Grant(TokenGrant),
}

impl Default for CallbackResponse {
    fn default() -> Self {
        Self::Grant(TokenGrant::default())
    }
}

/// Direct code exchange for clients that performed the redirect leg
/// themselves.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeRequest {
    /// Must be `authorization_code`.
    pub grant_type: GrantType,

    /// Authorization code issued by the provider.
    pub code: String,

    /// Correlation state from the matching authorization request.
    pub state: String,
}

/// Refresh token exchange.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshRequest {
    /// Must be `refresh_token`.
    pub grant_type: GrantType,

    /// The refresh token to consume. Single use.
    pub refresh_token: String,
}

/// RFC 7662 introspection request. The caller authenticates with its own
/// bearer token and asks about `token`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IntrospectRequest {
    /// The token under introspection.
    pub token: String,

    /// The caller's own bearer token.
    pub access_token: String,
}

/// RFC 7662 introspection response.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IntrospectResponse {
    /// Whether the token is currently valid.
    pub active: bool,

    /// Subject (principal id) of the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issue time, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiry time, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Always `Bearer` for active tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Whether the token is an access or refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_kind: Option<String>,
}

/// Revocation request. Blacklists the presented access token and, when
/// supplied, its refresh token.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RevokeRequest {
    /// The access token to revoke. Also authenticates the call.
    pub access_token: String,

    /// Refresh token to revoke alongside.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Empty reply with 204 semantics.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NoContent;

/// Logout request: revokes the session's tokens.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LogoutRequest {
    /// The session's access token.
    pub access_token: String,

    /// The session's refresh token, when the client still holds one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Request for the current principal.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UserInfoRequest {
    /// The caller's bearer token.
    pub access_token: String,
}

/// Request to begin a SAML login.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SamlLoginRequest {
    /// SAML provider to federate to.
    pub provider: String,

    /// Where to deliver tokens after the assertion is consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_callback: Option<String>,
}

/// Reply to a SAML login request: redirect binding to the IdP.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SamlLoginResponse {
    /// SSO URL carrying the deflated `SAMLRequest` and `RelayState`.
    pub redirect: String,

    /// The relay state the assertion consumer must present.
    pub relay_state: String,
}

/// Assertion Consumer Service input: the IdP form post.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AcsRequest {
    /// Base64-encoded `samlp:Response`.
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,

    /// Relay state from the matching login request.
    #[serde(rename = "RelayState")]
    pub relay_state: String,
}

/// Single Logout request.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SloRequest {
    /// The session's access token.
    pub access_token: String,

    /// The session's refresh token, when the client still holds one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Single Logout reply.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SloResponse {
    /// IdP logout URL to redirect the user agent to, when the provider
    /// registers one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

/// Request for the SP metadata document.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SamlMetadataRequest;

/// SP metadata document.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SamlMetadataResponse {
    /// `EntityDescriptor` XML.
    pub xml: String,
}

/// Read-once identity configuration supplied by the embedding service.
#[derive(Clone, Debug, Deserialize, Serialize, derive_builder::Builder)]
#[builder(default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Access token lifetime, seconds.
    pub access_ttl_secs: i64,

    /// Refresh token lifetime, seconds.
    pub refresh_ttl_secs: i64,

    /// Bound on outbound provider calls, seconds.
    pub provider_timeout_secs: u64,

    /// This service's OAuth callback URL, registered with every OAuth
    /// provider as the redirect URI.
    pub callback_url: String,

    /// SAML SP entity id.
    pub sp_entity_id: String,

    /// SAML assertion consumer service URL.
    pub acs_url: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: 3600,
            refresh_ttl_secs: 30 * 24 * 3600,
            provider_timeout_secs: 10,
            callback_url: String::new(),
            sp_entity_id: String::new(),
            acs_url: String::new(),
        }
    }
}

impl IdentityConfig {
    /// Returns a new [`IdentityConfigBuilder`].
    #[must_use]
    pub fn builder() -> IdentityConfigBuilder {
        IdentityConfigBuilder::default()
    }

    /// Access token lifetime.
    #[must_use]
    pub fn access_ttl(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::try_seconds(self.access_ttl_secs).unwrap_or_default()
    }

    /// Refresh token lifetime.
    #[must_use]
    pub fn refresh_ttl(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::try_seconds(self.refresh_ttl_secs).unwrap_or_default()
    }

    /// Provider call timeout.
    #[must_use]
    pub const fn provider_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.provider_timeout_secs)
    }
}

/// A fingerprint recorded against a principal at token mint, enabling
/// bulk revocation when the principal is deleted.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IssuedToken {
    /// SHA-256 fingerprint of the full token.
    pub fingerprint: String,

    /// Natural expiry of the token.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_builder_defaults() {
        let config = IdentityConfig::builder()
            .access_ttl_secs(600)
            .sp_entity_id("urn:test:sp".to_string())
            .build()
            .unwrap();

        assert_eq!(config.access_ttl(), chrono::TimeDelta::try_minutes(10).unwrap());
        assert_eq!(config.refresh_ttl_secs, IdentityConfig::default().refresh_ttl_secs);
        assert_eq!(config.sp_entity_id, "urn:test:sp");
    }

    #[test]
    fn principal_identity_pair() {
        let json = serde_json::json!({
            "id": "8b5a1dc2-6c9a-4f05-9d1e-000000000001",
            "provider": "corporate",
            "provider_id": "alice@example.com",
            "name": "Alice",
            "groups": ["security", "engineering"]
        });
        let principal: Principal = serde_json::from_value(json).unwrap();

        assert_eq!(principal.provider, "corporate");
        assert_eq!(principal.kind, PrincipalKind::User);
        assert!(principal.groups.contains("security"));
        assert!(principal.email.is_none());
    }
}
