//! # Client
//!
//! Fluent builders for identity requests, mirroring the server handlers.
//! Intended for client applications and tests driving the endpoints.

use crate::identity::types::{
    AuthorizeRequest, ExchangeRequest, IntrospectRequest, RefreshRequest, RevokeRequest,
    SamlLoginRequest,
};
use crate::oauth::GrantType;

/// Builds an [`AuthorizeRequest`].
#[derive(Clone, Debug, Default)]
pub struct AuthorizeRequestBuilder {
    request: AuthorizeRequest,
}

impl AuthorizeRequestBuilder {
    /// Returns a new builder with the `openid` scope preset.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request: AuthorizeRequest { scope: "openid".to_string(), ..AuthorizeRequest::default() },
        }
    }

    /// Provider to federate to.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.request.provider = provider.into();
        self
    }

    /// Requested scopes, space-separated.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.request.scope = scope.into();
        self
    }

    /// Caller-supplied correlation state.
    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.request.state = Some(state.into());
        self
    }

    /// Where to deliver tokens after the callback.
    #[must_use]
    pub fn client_callback(mut self, callback: impl Into<String>) -> Self {
        self.request.client_callback = Some(callback.into());
        self
    }

    /// Hint forwarded to the provider's login form.
    #[must_use]
    pub fn login_hint(mut self, hint: impl Into<String>) -> Self {
        self.request.login_hint = Some(hint.into());
        self
    }

    /// Build the request.
    #[must_use]
    pub fn build(self) -> AuthorizeRequest {
        self.request
    }
}

/// Builds an [`ExchangeRequest`].
#[derive(Clone, Debug, Default)]
pub struct ExchangeRequestBuilder {
    request: ExchangeRequest,
}

impl ExchangeRequestBuilder {
    /// Returns a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request: ExchangeRequest {
                grant_type: GrantType::AuthorizationCode,
                ..ExchangeRequest::default()
            },
        }
    }

    /// The authorization code issued by the provider.
    #[must_use]
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.request.code = code.into();
        self
    }

    /// Correlation state from the authorization request.
    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.request.state = state.into();
        self
    }

    /// Build the request.
    #[must_use]
    pub fn build(self) -> ExchangeRequest {
        self.request
    }
}

/// Builds a [`RefreshRequest`].
#[derive(Clone, Debug, Default)]
pub struct RefreshRequestBuilder {
    request: RefreshRequest,
}

impl RefreshRequestBuilder {
    /// Returns a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request: RefreshRequest {
                grant_type: GrantType::RefreshToken,
                ..RefreshRequest::default()
            },
        }
    }

    /// The refresh token to consume.
    #[must_use]
    pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
        self.request.refresh_token = token.into();
        self
    }

    /// Build the request.
    #[must_use]
    pub fn build(self) -> RefreshRequest {
        self.request
    }
}

/// Builds an [`IntrospectRequest`].
#[derive(Clone, Debug, Default)]
pub struct IntrospectRequestBuilder {
    request: IntrospectRequest,
}

impl IntrospectRequestBuilder {
    /// Returns a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The token under introspection.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.request.token = token.into();
        self
    }

    /// The caller's own bearer token.
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.request.access_token = token.into();
        self
    }

    /// Build the request.
    #[must_use]
    pub fn build(self) -> IntrospectRequest {
        self.request
    }
}

/// Builds a [`RevokeRequest`].
#[derive(Clone, Debug, Default)]
pub struct RevokeRequestBuilder {
    request: RevokeRequest,
}

impl RevokeRequestBuilder {
    /// Returns a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The access token to revoke.
    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.request.access_token = token.into();
        self
    }

    /// Refresh token to revoke alongside.
    #[must_use]
    pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
        self.request.refresh_token = Some(token.into());
        self
    }

    /// Build the request.
    #[must_use]
    pub fn build(self) -> RevokeRequest {
        self.request
    }
}

/// Builds a [`SamlLoginRequest`].
#[derive(Clone, Debug, Default)]
pub struct SamlLoginRequestBuilder {
    request: SamlLoginRequest,
}

impl SamlLoginRequestBuilder {
    /// Returns a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider to federate to.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.request.provider = provider.into();
        self
    }

    /// Where to deliver tokens after the assertion is consumed.
    #[must_use]
    pub fn client_callback(mut self, callback: impl Into<String>) -> Self {
        self.request.client_callback = Some(callback.into());
        self
    }

    /// Build the request.
    #[must_use]
    pub fn build(self) -> SamlLoginRequest {
        self.request
    }
}
