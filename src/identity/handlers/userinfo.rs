//! # UserInfo Handler
//!
//! Returns the Principal behind the presented bearer token, with group
//! memberships as resolved at token issue.

use crate::error::{Error, Result};
use crate::identity::endpoint::{Body, Handler, Request, Response};
use crate::identity::provider::{Provider, Subject};
use crate::identity::token::{self, TokenKind};
use crate::identity::types::{Principal, UserInfoRequest};
use crate::{invalid, server};

async fn userinfo(provider: &impl Provider, request: UserInfoRequest) -> Result<Principal> {
    request.verify()?;

    let claims =
        token::validate_kind(provider, &request.access_token, TokenKind::Access).await?;

    Subject::principal(provider, claims.sub)
        .await
        .map_err(|e| server!("issue getting principal: {e}"))?
        .ok_or_else(|| Error::Unauthorized("principal no longer exists".to_string()))
}

impl Handler for Request<UserInfoRequest> {
    type Response = Principal;

    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        userinfo(provider, self.body)
    }
}

impl Body for UserInfoRequest {}

impl UserInfoRequest {
    fn verify(&self) -> Result<()> {
        tracing::debug!("userinfo::verify");

        if self.access_token.is_empty() {
            return Err(invalid!("missing `access_token`"));
        }
        Ok(())
    }
}
