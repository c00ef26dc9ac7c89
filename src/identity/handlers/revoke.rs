//! # Revoke Handler
//!
//! Blacklists the presented access token and, when supplied, its refresh
//! token. Entries carry the token's remaining lifetime, so they expire
//! with the token itself.

use crate::error::Result;
use crate::identity::endpoint::{Body, Handler, Request, Response};
use crate::identity::provider::Provider;
use crate::identity::token::{self, TokenKind};
use crate::identity::types::{NoContent, RevokeRequest};
use crate::invalid;

async fn revoke(provider: &impl Provider, request: RevokeRequest) -> Result<Response<NoContent>> {
    request.verify()?;

    // the access token authenticates the call before it is retired
    token::validate_kind(provider, &request.access_token, TokenKind::Access).await?;
    token::revoke(provider, &request.access_token).await?;

    if let Some(refresh_token) = &request.refresh_token {
        token::revoke(provider, refresh_token).await?;
    }

    Ok(Response { status: 204, headers: None, body: NoContent })
}

impl Handler for Request<RevokeRequest> {
    type Response = NoContent;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        revoke(provider, self.body)
    }
}

impl Body for RevokeRequest {}

impl RevokeRequest {
    fn verify(&self) -> Result<()> {
        tracing::debug!("revoke::verify");

        if self.access_token.is_empty() {
            return Err(invalid!("missing `access_token`"));
        }
        Ok(())
    }
}
