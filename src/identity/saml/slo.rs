//! # Single Logout Handler
//!
//! Ends the session: the presented tokens are blacklisted, and when the
//! principal's provider registers a single-logout URL the reply carries a
//! redirect to it.

use crate::error::Result;
use crate::identity::endpoint::{Body, Handler, Request, Response, redirect};
use crate::identity::provider::{Metadata, Provider, Subject};
use crate::identity::token::{self, TokenKind};
use crate::identity::types::{SloRequest, SloResponse};
use crate::{invalid, server};

async fn slo(provider: &impl Provider, request: SloRequest) -> Result<Response<SloResponse>> {
    request.verify()?;

    let claims =
        token::validate_kind(provider, &request.access_token, TokenKind::Access).await?;

    token::revoke(provider, &request.access_token).await?;
    if let Some(refresh_token) = &request.refresh_token {
        token::revoke(provider, refresh_token).await?;
    }

    // redirect to the IdP logout URL when the provider registers one
    let principal = Subject::principal(provider, claims.sub)
        .await
        .map_err(|e| server!("issue getting principal: {e}"))?;
    let slo_endpoint = match principal {
        Some(p) => Metadata::provider(provider, &p.provider)
            .await
            .ok()
            .and_then(|r| r.slo_endpoint),
        None => None,
    };

    match slo_endpoint {
        Some(location) => {
            Ok(redirect(&location, SloResponse { redirect: Some(location.clone()) }))
        }
        None => Ok(SloResponse { redirect: None }.into()),
    }
}

impl Handler for Request<SloRequest> {
    type Response = SloResponse;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        slo(provider, self.body)
    }
}

impl Body for SloRequest {}

impl SloRequest {
    fn verify(&self) -> Result<()> {
        tracing::debug!("slo::verify");

        if self.access_token.is_empty() {
            return Err(invalid!("missing `access_token`"));
        }
        Ok(())
    }
}
