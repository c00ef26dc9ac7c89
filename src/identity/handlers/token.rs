//! # Token Handler
//!
//! Provider-neutral code exchange for clients that performed the redirect
//! leg themselves. Consumes the same stored flow state as the callback
//! handler but always returns the grant as a JSON body.

use crate::error::Result;
use crate::identity::endpoint::{Body, Handler, Request, Response};
use crate::identity::handlers::callback::complete_flow;
use crate::identity::provider::Provider;
use crate::identity::token;
use crate::identity::types::ExchangeRequest;
use crate::invalid;
use crate::oauth::{GrantType, TokenGrant};

async fn exchange(provider: &impl Provider, request: ExchangeRequest) -> Result<TokenGrant> {
    request.verify()?;

    let (principal, _) = complete_flow(provider, &request.code, &request.state).await?;
    token::mint(provider, &principal).await
}

impl Handler for Request<ExchangeRequest> {
    type Response = TokenGrant;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        exchange(provider, self.body)
    }
}

impl Body for ExchangeRequest {}

impl ExchangeRequest {
    fn verify(&self) -> Result<()> {
        tracing::debug!("token::verify");

        if self.grant_type != GrantType::AuthorizationCode {
            return Err(invalid!("`grant_type` must be `authorization_code`"));
        }
        if self.code.is_empty() || self.state.is_empty() {
            return Err(invalid!("missing `code` or `state`"));
        }
        Ok(())
    }
}
