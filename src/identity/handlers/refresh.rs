//! # Refresh Handler
//!
//! Exchanges a refresh token for a fresh access/refresh pair. The
//! presented refresh token is single use: it is blacklisted on success,
//! so a second exchange fails with `invalid_grant`. Any access token
//! issued alongside it lives out its own TTL.

use crate::error::{Error, Result};
use crate::identity::endpoint::{Body, Handler, Request, Response};
use crate::identity::provider::{Blocklist, Provider, Subject};
use crate::identity::token::{self, TokenKind, TokenStatus};
use crate::identity::types::RefreshRequest;
use crate::oauth::{GrantType, TokenGrant};
use crate::{invalid, server};

async fn refresh(provider: &impl Provider, request: RefreshRequest) -> Result<TokenGrant> {
    request.verify()?;

    let claims = match token::classify(provider, &request.refresh_token).await? {
        TokenStatus::Active(claims) if claims.kind == TokenKind::Refresh => claims,
        _ => return Err(Error::InvalidGrant("refresh token is not valid".to_string())),
    };

    // single use: retire the presented token before minting
    Blocklist::block(provider, &token::fingerprint(&request.refresh_token), claims.expires_at())
        .await
        .map_err(|e| server!("issue blocking refresh token: {e}"))?;

    let principal = Subject::principal(provider, claims.sub)
        .await
        .map_err(|e| server!("issue getting principal: {e}"))?
        .ok_or_else(|| Error::InvalidGrant("principal no longer exists".to_string()))?;

    token::mint(provider, &principal).await
}

impl Handler for Request<RefreshRequest> {
    type Response = TokenGrant;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        refresh(provider, self.body)
    }
}

impl Body for RefreshRequest {}

impl RefreshRequest {
    fn verify(&self) -> Result<()> {
        tracing::debug!("refresh::verify");

        if self.grant_type != GrantType::RefreshToken {
            return Err(invalid!("`grant_type` must be `refresh_token`"));
        }
        if self.refresh_token.is_empty() {
            return Err(invalid!("missing `refresh_token`"));
        }
        Ok(())
    }
}
