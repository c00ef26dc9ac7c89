//! # Assertion Consumer Service Handler
//!
//! Consumes the IdP's posted response: decodes and validates the signed
//! assertion, maps its attributes to a Principal, and mints tokens the
//! same way the OAuth callback does. The relay state is single use.

use base64ct::{Base64, Encoding};

use crate::error::{Error, Result};
use crate::identity::endpoint::{Body, Handler, Request, Response};
use crate::identity::handlers::callback::finish_login;
use crate::identity::provider::{Metadata, Provider, StateStore, Subject};
use crate::identity::saml::assertion;
use crate::identity::state::{RelayState, relay_key};
use crate::identity::types::{AcsRequest, CallbackResponse, Principal};
use crate::{invalid, server};

async fn acs(provider: &impl Provider, request: AcsRequest) -> Result<Response<CallbackResponse>> {
    request.verify()?;

    let key = relay_key(&request.relay_state);
    let Ok(relay) = StateStore::get::<RelayState>(provider, &key).await else {
        return Err(Error::InvalidGrant("relay state not found".to_string()));
    };

    // single use: consume before validating
    StateStore::purge(provider, &key)
        .await
        .map_err(|e| server!("issue purging relay state: {e}"))?;
    if relay.expired() {
        return Err(Error::InvalidGrant("relay state has expired".to_string()));
    }

    let registration = Metadata::provider(provider, &relay.provider)
        .await
        .map_err(|e| server!("issue getting provider registration: {e}"))?;
    let config =
        Metadata::config(provider).await.map_err(|e| server!("issue getting config: {e}"))?;

    let Ok(decoded) = Base64::decode_vec(&request.saml_response) else {
        return Err(invalid!("`SAMLResponse` is not base64"));
    };
    let Ok(xml) = String::from_utf8(decoded) else {
        return Err(invalid!("`SAMLResponse` is not UTF-8"));
    };

    let assertion = assertion::parse(&xml)?;
    assertion.verify(&registration, &config, &relay)?;
    let profile = assertion.to_profile()?;

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

    finish_login(provider, &principal, relay.client_callback).await
}

impl Handler for Request<AcsRequest> {
    type Response = CallbackResponse;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        acs(provider, self.body)
    }
}

impl Body for AcsRequest {}

impl AcsRequest {
    fn verify(&self) -> Result<()> {
        tracing::debug!("acs::verify");

        if self.saml_response.is_empty() || self.relay_state.is_empty() {
            return Err(invalid!("missing `SAMLResponse` or `RelayState`"));
        }
        Ok(())
    }
}
