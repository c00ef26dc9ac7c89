//! # OAuth 2.0 Wire Primitives
//!
//! Types shared between the identity handlers and the outbound provider
//! client: grant types, token grants, and provider registrations.

use serde::{Deserialize, Serialize};

/// OAuth 2.0 grant types supported by the token endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum GrantType {
    /// Authorization Code grant, always with PKCE.
    #[default]
    #[serde(rename = "authorization_code")]
    AuthorizationCode,

    /// Refresh Token grant.
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

/// A minted access/refresh token pair, serialized per RFC 6749 §5.1.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TokenGrant {
    /// The bearer access token.
    pub access_token: String,

    /// Always `Bearer`.
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    /// Single-use refresh token, when issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// The authentication protocol a configured provider speaks.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OAuth 2.0 Authorization Code with PKCE, optionally OIDC.
    #[default]
    Oauth2,

    /// OpenID Connect: OAuth 2.0 plus the `openid` scope requirement.
    Oidc,

    /// SAML 2.0 Service Provider bindings.
    Saml2,
}

/// Registration for one external identity provider, read once at startup.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Short provider identifier used in request paths (`idp=` parameter).
    pub id: String,

    /// Human-readable name for provider selection UIs.
    pub name: String,

    /// Protocol this provider speaks.
    pub kind: ProviderKind,

    /// OAuth client id registered with the provider.
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret, where the provider requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Provider authorization endpoint (OAuth) or SSO URL (SAML).
    pub authorization_endpoint: String,

    /// Provider token endpoint. Unused for SAML.
    #[serde(default)]
    pub token_endpoint: String,

    /// Provider userinfo/profile endpoint. Unused for SAML.
    #[serde(default)]
    pub userinfo_endpoint: String,

    /// Prefix every `client_callback` must fall under.
    #[serde(default)]
    pub redirect_prefix: String,

    /// SAML entity id of the identity provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// SAML single-logout URL, when the provider exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slo_endpoint: Option<String>,

    /// PEM certificate pinned for SAML response validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}
