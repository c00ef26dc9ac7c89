//! SAML 2.0 Service Provider Flow

mod utils;

use tmi_core::Error;
use tmi_core::identity::client::SamlLoginRequestBuilder;
use tmi_core::identity::endpoint;
use tmi_core::identity::provider::StateStore;
use tmi_core::identity::types::{
    AcsRequest, CallbackResponse, SamlMetadataRequest, SloRequest, UserInfoRequest,
};
use tmi_core::identity::{RelayState, relay_key};
use utils::{IDP_CERTIFICATE, IDP_ENTITY_ID, ProviderImpl, SAML_PROVIDER, SP_ENTITY_ID, saml_response};

// Should build a redirect-binding AuthnRequest and store relay state.
#[tokio::test]
async fn login_redirect() {
    let provider = ProviderImpl::new();

    let request = SamlLoginRequestBuilder::new().provider(SAML_PROVIDER).build();
    let response = endpoint::handle(request, &provider).await.expect("should redirect");

    assert_eq!(response.status, 302);
    assert!(response.redirect.starts_with(&format!("{IDP_ENTITY_ID}/sso?SAMLRequest=")));
    assert!(response.redirect.contains("&RelayState="));
    assert!(!response.relay_state.is_empty());
}

// Should consume a valid assertion and mint tokens exactly as the OAuth
// callback does.
#[tokio::test]
async fn acs_happy_path() {
    let provider = ProviderImpl::new();

    // --------------------------------------------------
    // Alice is sent to the IdP
    // --------------------------------------------------
    let request = SamlLoginRequestBuilder::new().provider(SAML_PROVIDER).build();
    let response = endpoint::handle(request, &provider).await.expect("should redirect");
    let relay_state = response.relay_state.clone();

    let relay: RelayState = StateStore::get(&provider, &relay_key(&relay_state))
        .await
        .expect("relay state should be stored");

    // --------------------------------------------------
    // The IdP posts back a signed assertion
    // --------------------------------------------------
    let request = AcsRequest {
        saml_response: saml_response(&relay.request_id, "alice@example.com", IDP_CERTIFICATE),
        relay_state: relay_state.clone(),
    };
    let response = endpoint::handle(request, &provider).await.expect("should mint tokens");

    let CallbackResponse::Grant(grant) = &response.body else {
        panic!("expected a JSON grant");
    };

    // --------------------------------------------------
    // The minted token identifies the SAML principal
    // --------------------------------------------------
    let request = UserInfoRequest { access_token: grant.access_token.clone() };
    let principal = endpoint::handle(request, &provider).await.expect("should return principal");
    assert_eq!(principal.provider, SAML_PROVIDER);
    assert_eq!(principal.provider_id, "alice@example.com");

    // --------------------------------------------------
    // Relay state is single use
    // --------------------------------------------------
    let request = AcsRequest {
        saml_response: saml_response(&relay.request_id, "alice@example.com", IDP_CERTIFICATE),
        relay_state,
    };
    let err = endpoint::handle(request, &provider).await.expect_err("replay should fail");
    assert!(matches!(err, Error::InvalidGrant(_)));
}

// Should reject an assertion whose certificate does not match the pinned
// registration, without revealing which check failed.
#[tokio::test]
async fn acs_certificate_mismatch() {
    let provider = ProviderImpl::new();

    let request = SamlLoginRequestBuilder::new().provider(SAML_PROVIDER).build();
    let response = endpoint::handle(request, &provider).await.expect("should redirect");

    let relay: RelayState = StateStore::get(&provider, &relay_key(&response.relay_state))
        .await
        .expect("relay state should be stored");

    let request = AcsRequest {
        saml_response: saml_response(&relay.request_id, "alice@example.com", "MIIForged=="),
        relay_state: response.relay_state.clone(),
    };
    let err = endpoint::handle(request, &provider).await.expect_err("should reject");
    assert!(matches!(err, Error::InvalidRequest(_)));
}

// Should reject an assertion answering a different request.
#[tokio::test]
async fn acs_in_response_to_mismatch() {
    let provider = ProviderImpl::new();

    let request = SamlLoginRequestBuilder::new().provider(SAML_PROVIDER).build();
    let response = endpoint::handle(request, &provider).await.expect("should redirect");

    let request = AcsRequest {
        saml_response: saml_response("id-someone-else", "alice@example.com", IDP_CERTIFICATE),
        relay_state: response.relay_state.clone(),
    };
    let err = endpoint::handle(request, &provider).await.expect_err("should reject");
    assert!(matches!(err, Error::InvalidRequest(_)));
}

// Single logout blacklists the session tokens and redirects to the IdP.
#[tokio::test]
async fn single_logout() {
    let provider = ProviderImpl::new();

    let request = SamlLoginRequestBuilder::new().provider(SAML_PROVIDER).build();
    let response = endpoint::handle(request, &provider).await.expect("should redirect");
    let relay: RelayState = StateStore::get(&provider, &relay_key(&response.relay_state))
        .await
        .expect("relay state should be stored");

    let request = AcsRequest {
        saml_response: saml_response(&relay.request_id, "alice@example.com", IDP_CERTIFICATE),
        relay_state: response.relay_state.clone(),
    };
    let response = endpoint::handle(request, &provider).await.expect("should mint tokens");
    let CallbackResponse::Grant(grant) = response.body else {
        panic!("expected a JSON grant");
    };

    let request = SloRequest {
        access_token: grant.access_token.clone(),
        refresh_token: grant.refresh_token,
    };
    let response = endpoint::handle(request, &provider).await.expect("should log out");
    assert_eq!(response.redirect.as_deref(), Some(&*format!("{IDP_ENTITY_ID}/slo")));

    let request = UserInfoRequest { access_token: grant.access_token };
    let err = endpoint::handle(request, &provider).await.expect_err("should be unauthorized");
    assert!(matches!(err, Error::Unauthorized(_)));
}

// The SP metadata document carries the configured entity id and ACS URL.
#[tokio::test]
async fn sp_metadata() {
    let provider = ProviderImpl::new();

    let response =
        endpoint::handle(SamlMetadataRequest, &provider).await.expect("should return metadata");
    assert!(response.xml.contains(&format!(r#"entityID="{SP_ENTITY_ID}""#)));
    assert!(response.xml.contains("AssertionConsumerService"));
}
