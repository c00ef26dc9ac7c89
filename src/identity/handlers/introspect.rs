//! # Introspect Handler
//!
//! RFC 7662 token introspection. This is the only operation that
//! distinguishes expired, revoked, and malformed tokens, and only to
//! callers presenting a valid bearer token of their own: active and
//! expired-or-revoked tokens return their claims with the `active` flag,
//! unparseable tokens return `active: false` alone.

use crate::error::Result;
use crate::identity::endpoint::{Body, Handler, Request, Response};
use crate::identity::provider::Provider;
use crate::identity::token::{self, Claims, TokenKind, TokenStatus};
use crate::identity::types::{IntrospectRequest, IntrospectResponse};
use crate::invalid;

async fn introspect(
    provider: &impl Provider, request: IntrospectRequest,
) -> Result<IntrospectResponse> {
    request.verify()?;

    // introspection is only available to authenticated callers
    token::validate_kind(provider, &request.access_token, TokenKind::Access).await?;

    let response = match token::classify(provider, &request.token).await? {
        TokenStatus::Active(claims) => describe(&claims, true),
        TokenStatus::Expired(claims) | TokenStatus::Revoked(claims) => describe(&claims, false),
        TokenStatus::Invalid => IntrospectResponse::default(),
    };

    Ok(response)
}

fn describe(claims: &Claims, active: bool) -> IntrospectResponse {
    IntrospectResponse {
        active,
        sub: Some(claims.sub.to_string()),
        iat: Some(claims.iat),
        exp: Some(claims.exp),
        token_type: Some("Bearer".to_string()),
        token_kind: Some(claims.kind.as_str().to_string()),
    }
}

impl Handler for Request<IntrospectRequest> {
    type Response = IntrospectResponse;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        introspect(provider, self.body)
    }
}

impl Body for IntrospectRequest {}

impl IntrospectRequest {
    fn verify(&self) -> Result<()> {
        tracing::debug!("introspect::verify");

        if self.token.is_empty() {
            return Err(invalid!("missing `token`"));
        }
        Ok(())
    }
}
