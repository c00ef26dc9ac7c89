//! # Authorize Handler
//!
//! Begins an OAuth Authorization Code flow with PKCE (RFC 7636, `S256`
//! only). A code verifier is generated and stored keyed by the flow's
//! `state`; the reply is a redirect to the provider's authorization
//! endpoint carrying the challenge.

use chrono::Utc;
use serde::Serialize;

use crate::core::{generate, pkce, urlencode};
use crate::error::{Error, Result};
use crate::identity::endpoint::{Body, Handler, Request, Response, redirect};
use crate::identity::provider::{Metadata, Provider, StateStore};
use crate::identity::state::{AuthState, Expire, auth_key};
use crate::identity::types::{AuthorizeRequest, AuthorizeResponse, IdentityConfig};
use crate::oauth::{ProviderConfig, ProviderKind};
use crate::server;

#[derive(Debug, Default)]
struct Context {
    registration: ProviderConfig,
    config: IdentityConfig,
}

async fn authorize(
    provider: &impl Provider, request: AuthorizeRequest,
) -> Result<Response<AuthorizeResponse>> {
    let Ok(registration) = Metadata::provider(provider, &request.provider).await else {
        return Err(Error::InvalidProvider(format!("unknown provider: {}", request.provider)));
    };
    let config =
        Metadata::config(provider).await.map_err(|e| server!("issue getting config: {e}"))?;

    let ctx = Context { registration, config };
    request.verify(&ctx)?;

    // caller-supplied state or a server-generated correlation id
    let state = request.state.clone().unwrap_or_else(generate::uri_token);
    let verifier = pkce::code_verifier();

    let auth_state = AuthState {
        expires_at: Utc::now() + Expire::Authorization.duration(),
        provider: ctx.registration.id.clone(),
        verifier: verifier.clone(),
        scope: request.scope.clone(),
        client_callback: request.client_callback.clone(),
        login_hint: request.login_hint.clone(),
    };
    StateStore::put(provider, &auth_key(&state), &auth_state, auth_state.expires_at)
        .await
        .map_err(|e| server!("issue saving state: {e}"))?;

    let location = request.auth_url(&ctx, &state, &pkce::code_challenge(&verifier))?;
    Ok(redirect(&location, AuthorizeResponse { redirect: location.clone(), state }))
}

impl Handler for Request<AuthorizeRequest> {
    type Response = AuthorizeResponse;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        authorize(provider, self.body)
    }
}

impl Body for AuthorizeRequest {}

/// Authorization endpoint query parameters, in wire order.
#[derive(Serialize)]
struct AuthParams<'a> {
    client_id: &'a str,
    code_challenge: &'a str,
    code_challenge_method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    login_hint: Option<&'a str>,
    redirect_uri: &'a str,
    response_type: &'static str,
    scope: &'a str,
    state: &'a str,
}

impl AuthorizeRequest {
    fn verify(&self, ctx: &Context) -> Result<()> {
        tracing::debug!("authorize::verify");

        if ctx.registration.kind == ProviderKind::Saml2 {
            return Err(Error::InvalidProvider(
                "provider does not speak OAuth; use the SAML login".to_string(),
            ));
        }

        if self.scope.trim().is_empty() {
            return Err(Error::InvalidScope("no scope requested".to_string()));
        }
        if ctx.registration.kind == ProviderKind::Oidc
            && !self.scope.split_whitespace().any(|s| s == "openid")
        {
            return Err(Error::InvalidScope("`openid` scope is required".to_string()));
        }

        // the client callback must fall under the registered prefix
        if let Some(callback) = &self.client_callback {
            if !ctx.registration.redirect_prefix.is_empty()
                && !callback.starts_with(&ctx.registration.redirect_prefix)
            {
                return Err(Error::InvalidRedirect(
                    "client callback is not registered".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn auth_url(&self, ctx: &Context, state: &str, challenge: &str) -> Result<String> {
        let params = AuthParams {
            client_id: &ctx.registration.client_id,
            code_challenge: challenge,
            code_challenge_method: "S256",
            login_hint: self.login_hint.as_deref(),
            redirect_uri: &ctx.config.callback_url,
            response_type: "code",
            scope: &self.scope,
            state,
        };
        let query = urlencode::to_string(&params)
            .map_err(|e| server!("issue serializing auth params: {e}"))?;

        Ok(format!("{}?{query}", ctx.registration.authorization_endpoint))
    }
}
