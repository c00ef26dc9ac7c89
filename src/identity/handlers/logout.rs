//! # Logout Handler
//!
//! Ends the caller's session by writing the current access token and any
//! refresh token still held into the blocklist.

use crate::error::Result;
use crate::identity::endpoint::{Body, Handler, Request, Response};
use crate::identity::provider::Provider;
use crate::identity::token::{self, TokenKind};
use crate::identity::types::{LogoutRequest, NoContent};
use crate::invalid;

async fn logout(provider: &impl Provider, request: LogoutRequest) -> Result<Response<NoContent>> {
    request.verify()?;

    let claims =
        token::validate_kind(provider, &request.access_token, TokenKind::Access).await?;
    tracing::debug!(principal = %claims.sub, "logout");

    token::revoke(provider, &request.access_token).await?;
    if let Some(refresh_token) = &request.refresh_token {
        token::revoke(provider, refresh_token).await?;
    }

    Ok(Response { status: 204, headers: None, body: NoContent })
}

impl Handler for Request<LogoutRequest> {
    type Response = NoContent;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        logout(provider, self.body)
    }
}

impl Body for LogoutRequest {}

impl LogoutRequest {
    fn verify(&self) -> Result<()> {
        tracing::debug!("logout::verify");

        if self.access_token.is_empty() {
            return Err(invalid!("missing `access_token`"));
        }
        Ok(())
    }
}
