//! # SP Metadata Handler
//!
//! Serves the service provider's `EntityDescriptor` for IdP-side
//! registration.

use crate::error::Result;
use crate::identity::endpoint::{Body, Handler, Request, Response};
use crate::identity::provider::{Metadata, Provider};
use crate::identity::types::{SamlMetadataRequest, SamlMetadataResponse};
use crate::server;

async fn sp_metadata(
    provider: &impl Provider, _request: SamlMetadataRequest,
) -> Result<SamlMetadataResponse> {
    let config =
        Metadata::config(provider).await.map_err(|e| server!("issue getting config: {e}"))?;

    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{entity_id}">
  <md:SPSSODescriptor AuthnRequestsSigned="false" WantAssertionsSigned="true" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:NameIDFormat>urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress</md:NameIDFormat>
    <md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{acs}" index="0" isDefault="true"/>
  </md:SPSSODescriptor>
</md:EntityDescriptor>
"#,
        entity_id = config.sp_entity_id,
        acs = config.acs_url,
    );

    Ok(SamlMetadataResponse { xml })
}

impl Handler for Request<SamlMetadataRequest> {
    type Response = SamlMetadataResponse;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        sp_metadata(provider, self.body)
    }
}

impl Body for SamlMetadataRequest {}
