//! # Callback Handler
//!
//! Consumes the provider's `code` and `state`, exchanges the code at the
//! provider's token endpoint using the stored PKCE verifier, maps the
//! fetched profile to a Principal, and mints a token pair. Tokens are
//! returned as JSON or appended to the previously registered client
//! callback.
//!
//! The stored flow state is single use: it is purged before the outbound
//! exchange, so a replayed `state` fails with `invalid_grant`.

use tokio::time::timeout;

use crate::core::urlencode;
use crate::error::{Error, Result};
use crate::identity::endpoint::{Body, Handler, Request, Response, redirect};
use crate::identity::provider::{Idp, Metadata, Provider, StateStore, Subject};
use crate::identity::state::{AuthState, auth_key};
use crate::identity::token;
use crate::identity::types::{CallbackRequest, CallbackResponse, Principal};
use crate::{invalid, server};

async fn callback(
    provider: &impl Provider, request: CallbackRequest,
) -> Result<Response<CallbackResponse>> {
    request.verify()?;

    let (principal, client_callback) =
        complete_flow(provider, &request.code, &request.state).await?;
    finish_login(provider, &principal, client_callback).await
}

impl Handler for Request<CallbackRequest> {
    type Response = CallbackResponse;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        callback(provider, self.body)
    }
}

impl Body for CallbackRequest {}

impl CallbackRequest {
    fn verify(&self) -> Result<()> {
        tracing::debug!("callback::verify");

        if self.code.is_empty() || self.state.is_empty() {
            return Err(invalid!("missing `code` or `state`"));
        }
        Ok(())
    }
}

/// Consume the stored flow state, exchange the code, and upsert the
/// Principal. Shared with the direct exchange handler.
pub(crate) async fn complete_flow(
    provider: &impl Provider, code: &str, state: &str,
) -> Result<(Principal, Option<String>)> {
    let key = auth_key(state);
    let Ok(auth_state) = StateStore::get::<AuthState>(provider, &key).await else {
        return Err(Error::InvalidGrant("authorization state not found".to_string()));
    };

    // single use: consume before going to the provider
    StateStore::purge(provider, &key)
        .await
        .map_err(|e| server!("issue purging state: {e}"))?;
    if auth_state.expired() {
        return Err(Error::InvalidGrant("authorization state has expired".to_string()));
    }

    let registration = Metadata::provider(provider, &auth_state.provider)
        .await
        .map_err(|e| server!("issue getting provider registration: {e}"))?;
    let config =
        Metadata::config(provider).await.map_err(|e| server!("issue getting config: {e}"))?;

    let exchanged = timeout(
        config.provider_timeout(),
        Idp::exchange_code(provider, &registration, code, &auth_state.verifier),
    )
    .await;
    let tokens = match exchanged {
        Err(_) => {
            tracing::warn!(provider = %registration.id, "token endpoint timed out");
            return Err(Error::ProviderUnavailable("provider did not answer".to_string()));
        }
        Ok(Err(_)) => return Err(Error::InvalidGrant("code exchange refused".to_string())),
        Ok(Ok(tokens)) => tokens,
    };

    let fetched = timeout(
        config.provider_timeout(),
        Idp::fetch_profile(provider, &registration, &tokens.access_token),
    )
    .await;
    let profile = match fetched {
        Err(_) => {
            tracing::warn!(provider = %registration.id, "userinfo endpoint timed out");
            return Err(Error::ProviderUnavailable("provider did not answer".to_string()));
        }
        Ok(Err(e)) => return Err(server!("issue fetching profile: {e}")),
        Ok(Ok(profile)) => profile,
    };

    // first sight creates the principal record
    let principal = Subject::upsert(
        provider,
        &Principal {
            provider: registration.id.clone(),
            provider_id: profile.provider_id,
            name: profile.name,
            email: profile.email,
            groups: profile.groups,
            ..Principal::default()
        },
    )
    .await
    .map_err(|e| server!("issue saving principal: {e}"))?;

    Ok((principal, auth_state.client_callback))
}

/// Mint a token pair and reply: a redirect to the client callback with the
/// grant in the query string, or the grant as a JSON body. Shared with the
/// SAML assertion consumer.
pub(crate) async fn finish_login(
    provider: &impl Provider, principal: &Principal, client_callback: Option<String>,
) -> Result<Response<CallbackResponse>> {
    let grant = token::mint(provider, principal).await?;

    let Some(callback) = client_callback else {
        return Ok(CallbackResponse::Grant(grant).into());
    };

    let query =
        urlencode::to_string(&grant).map_err(|e| server!("issue serializing grant: {e}"))?;
    let separator = if callback.contains('?') { '&' } else { '?' };
    let location = format!("{callback}{separator}{query}");

    Ok(redirect(&location, CallbackResponse::Redirect(location.clone())))
}
