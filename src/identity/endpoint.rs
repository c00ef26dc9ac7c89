//! # Endpoint
//!
//! `Endpoint` provides the entry point for identity requests. Requests are
//! routed to the appropriate handler for processing, returning a reply
//! that can be serialized to a JSON object or turned into an HTTP
//! redirect.

use std::fmt::Debug;
use std::ops::Deref;

use http::HeaderMap;

use crate::error::Result;
use crate::identity::provider::Provider;

/// Handle incoming identity requests.
///
/// # Errors
///
/// This method can fail for a number of reasons related to the incoming
/// request's viability. Expected failures include unknown providers,
/// consumed or expired flow state, and invalid bearer tokens.
///
/// Implementers should look to the `Error` type and description for more
/// information on the reason for failure.
pub async fn handle<B, U>(
    request: impl Into<Request<B>>, provider: &impl Provider,
) -> Result<Response<U>>
where
    B: Body,
    Request<B>: Handler<Response = U>,
{
    let request: Request<B> = request.into();
    request.validate(provider).await?;
    Ok(request.handle(provider).await?.into())
}

/// A request to process.
#[derive(Clone, Debug)]
pub struct Request<B: Body> {
    /// The request to process.
    pub body: B,
}

impl<B: Body> From<B> for Request<B> {
    fn from(body: B) -> Self {
        Self { body }
    }
}

/// A handler response paired with transport concerns: the HTTP status the
/// wrapper should use and any headers (`Location` for redirect-mode
/// replies).
#[derive(Clone, Debug)]
pub struct Response<T> {
    /// HTTP status for the wrapping server to use.
    pub status: u16,

    /// Headers to set on the HTTP response, when any.
    pub headers: Option<HeaderMap>,

    /// The response body.
    pub body: T,
}

impl<T> From<T> for Response<T> {
    fn from(body: T) -> Self {
        Self { status: 200, headers: None, body }
    }
}

impl<T> Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.body
    }
}

/// Methods common to all requests.
///
/// The primary role of this trait is to provide a common interface for
/// requests so they can be handled by the [`handle`] method.
pub trait Handler: Clone + Debug + Send + Sync {
    /// The inner reply type specific to the implementing request.
    type Response;

    /// Routes the request to the concrete handler used to process it.
    fn handle(
        self, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send;

    /// Perform initial validation of the request.
    ///
    /// Validation undertaken here is common to all requests, with
    /// request-specific validation performed by the request's handler.
    fn validate(&self, _provider: &impl Provider) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

pub(crate) use seal::Body;
pub(crate) mod seal {
    use std::fmt::Debug;

    /// The `Body` trait is used to restrict the types able to be a Request
    /// body. It is implemented by all `XxxRequest` types.
    pub trait Body: Clone + Debug + Send + Sync {}
}

/// Build a redirect response: status 302 with a `Location` header.
pub(crate) fn redirect<T>(location: &str, body: T) -> Response<T> {
    let mut headers = HeaderMap::new();
    if let Ok(value) = location.parse() {
        headers.insert(http::header::LOCATION, value);
    }
    Response { status: 302, headers: Some(headers), body }
}
