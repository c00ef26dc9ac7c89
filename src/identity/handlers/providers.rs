//! # Providers Handler
//!
//! Lists the configured identity providers with the metadata a client
//! needs to start a flow.

use crate::error::Result;
use crate::identity::endpoint::{Body, Handler, Request, Response};
use crate::identity::provider::{Metadata, Provider};
use crate::identity::types::{ProviderInfo, ProvidersRequest, ProvidersResponse};
use crate::server;

async fn providers(
    provider: &impl Provider, _request: ProvidersRequest,
) -> Result<ProvidersResponse> {
    let configured = Metadata::providers(provider)
        .await
        .map_err(|e| server!("issue getting providers: {e}"))?;

    let providers = configured
        .into_iter()
        .map(|p| ProviderInfo {
            id: p.id,
            name: p.name,
            kind: p.kind,
            authorization_endpoint: p.authorization_endpoint,
        })
        .collect();

    Ok(ProvidersResponse { providers })
}

impl Handler for Request<ProvidersRequest> {
    type Response = ProvidersResponse;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        providers(provider, self.body)
    }
}

impl Body for ProvidersRequest {}
