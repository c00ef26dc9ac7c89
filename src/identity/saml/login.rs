//! # SAML Login Handler
//!
//! Builds an `AuthnRequest` for the redirect binding: deflated, base64
//! encoded, and appended to the provider's SSO URL together with a relay
//! state that correlates the eventual assertion.

use std::io::Write;

use base64ct::{Base64, Encoding};
use chrono::{SecondsFormat, Utc};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use crate::core::generate;
use crate::error::{Error, Result};
use crate::identity::endpoint::{Body, Handler, Request, Response, redirect};
use crate::identity::provider::{Metadata, Provider, StateStore};
use crate::identity::state::{Expire, RelayState, relay_key};
use crate::identity::types::{SamlLoginRequest, SamlLoginResponse};
use crate::oauth::ProviderKind;
use crate::server;

async fn login(
    provider: &impl Provider, request: SamlLoginRequest,
) -> Result<Response<SamlLoginResponse>> {
    let Ok(registration) = Metadata::provider(provider, &request.provider).await else {
        return Err(Error::InvalidProvider(format!("unknown provider: {}", request.provider)));
    };
    if registration.kind != ProviderKind::Saml2 {
        return Err(Error::InvalidProvider("provider does not speak SAML".to_string()));
    }
    let config =
        Metadata::config(provider).await.map_err(|e| server!("issue getting config: {e}"))?;

    let request_id = generate::request_id();
    let relay_state = generate::uri_token();

    let state = RelayState {
        expires_at: Utc::now() + Expire::Relay.duration(),
        provider: registration.id.clone(),
        request_id: request_id.clone(),
        client_callback: request.client_callback.clone(),
    };
    StateStore::put(provider, &relay_key(&relay_state), &state, state.expires_at)
        .await
        .map_err(|e| server!("issue saving relay state: {e}"))?;

    let authn_request = format!(
        r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{request_id}" Version="2.0" IssueInstant="{instant}" Destination="{destination}" AssertionConsumerServiceURL="{acs}"><saml:Issuer>{issuer}</saml:Issuer></samlp:AuthnRequest>"#,
        instant = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        destination = registration.authorization_endpoint,
        acs = config.acs_url,
        issuer = config.sp_entity_id,
    );

    // redirect binding: DEFLATE, then base64, then percent-encode
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(authn_request.as_bytes())
        .map_err(|e| server!("issue deflating request: {e}"))?;
    let deflated = encoder.finish().map_err(|e| server!("issue deflating request: {e}"))?;
    let encoded = Base64::encode_string(&deflated);

    let location = format!(
        "{}?SAMLRequest={}&RelayState={}",
        registration.authorization_endpoint,
        utf8_percent_encode(&encoded, NON_ALPHANUMERIC),
        utf8_percent_encode(&relay_state, NON_ALPHANUMERIC),
    );
    Ok(redirect(&location, SamlLoginResponse { redirect: location.clone(), relay_state }))
}

impl Handler for Request<SamlLoginRequest> {
    type Response = SamlLoginResponse;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        login(provider, self.body)
    }
}

impl Body for SamlLoginRequest {}
