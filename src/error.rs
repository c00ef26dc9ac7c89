//! # Errors
//!
//! Error types surfaced by the identity, authorization, and collaboration
//! cores. Every error serializes to the wire envelope
//! `{"error": <kind>, "error_description": <human text>}` and maps to a
//! single HTTP status code.

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::core::urlencode;

/// Result type for core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error codes surfaced to callers, grouped by HTTP mapping.
#[derive(Error, Debug, Deserialize)]
pub enum Error {
    /// The request body or parameters are structurally valid but violate a
    /// domain rule (for example, removing the last owner of a threat
    /// model).
    #[error(r#"{{"error": "invalid_input", "error_description": "{0}"}}"#)]
    InvalidInput(String),

    /// The request is missing a required parameter, repeats a parameter,
    /// or is otherwise malformed. Also returned for callbacks and
    /// assertions that fail validation, without distinguishing which
    /// condition matched.
    #[error(r#"{{"error": "invalid_request", "error_description": "{0}"}}"#)]
    InvalidRequest(String),

    /// The requested scope is invalid, unknown, or malformed. OIDC flows
    /// require the `openid` scope.
    #[error(r#"{{"error": "invalid_scope", "error_description": "{0}"}}"#)]
    InvalidScope(String),

    /// The named identity provider is not configured.
    #[error(r#"{{"error": "invalid_provider", "error_description": "{0}"}}"#)]
    InvalidProvider(String),

    /// The client callback is not registered for the provider.
    #[error(r#"{{"error": "invalid_redirect", "error_description": "{0}"}}"#)]
    InvalidRedirect(String),

    /// The PKCE challenge or verifier failed verification.
    #[error(r#"{{"error": "invalid_challenge", "error_description": "{0}"}}"#)]
    InvalidChallenge(String),

    /// The presented bearer token is missing, malformed, expired, or
    /// revoked. Introspection is the only operation that distinguishes
    /// these conditions.
    #[error(r#"{{"error": "unauthorized", "error_description": "{0}"}}"#)]
    Unauthorized(String),

    /// The authorization grant (code, stored flow state, or refresh
    /// token) is invalid, expired, already consumed, or was issued to
    /// another client.
    #[error(r#"{{"error": "invalid_grant", "error_description": "{0}"}}"#)]
    InvalidGrant(String),

    /// The caller is authenticated but its role is insufficient. Also
    /// returned for non-owner attempts to mutate an authorization list.
    #[error(r#"{{"error": "forbidden", "error_description": "{0}"}}"#)]
    Forbidden(String),

    /// The resource does not exist, or the caller holds no role on it.
    /// The two cases are indistinguishable to prevent resource
    /// enumeration.
    #[error(r#"{{"error": "not_found", "error_description": "{0}"}}"#)]
    NotFound(String),

    /// The operation conflicts with current state: an active
    /// collaboration session blocks the mutation, or a duplicate
    /// authorization subject was supplied.
    #[error(r#"{{"error": "conflict", "error_description": "{0}"}}"#)]
    Conflict(String),

    /// The caller has exceeded its request budget.
    #[error(r#"{{"error": "rate_limit_exceeded", "error_description": "{0}"}}"#)]
    RateLimitExceeded(String),

    /// An upstream identity provider did not answer within the configured
    /// timeout.
    #[error(r#"{{"error": "provider_unavailable", "error_description": "{0}"}}"#)]
    ProviderUnavailable(String),

    /// An unexpected internal condition. Details are logged, never
    /// returned.
    #[error(r#"{{"error": "server_error", "error_description": "{0}"}}"#)]
    ServerError(String),
}

impl Error {
    /// The HTTP status code this error maps to.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidRequest(_)
            | Self::InvalidScope(_)
            | Self::InvalidProvider(_)
            | Self::InvalidRedirect(_)
            | Self::InvalidChallenge(_) => 400,
            Self::Unauthorized(_) | Self::InvalidGrant(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::RateLimitExceeded(_) => 429,
            Self::ProviderUnavailable(_) => 503,
            Self::ServerError(_) => 500,
        }
    }

    /// Transform the error to the JSON wire envelope.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.to_string()).unwrap_or_default()
    }

    /// Transform the error to a query-string fragment for redirect-mode
    /// responses.
    #[must_use]
    pub fn to_querystring(&self) -> String {
        urlencode::to_string(&self).unwrap_or_default()
    }
}

/// Error envelope as it crosses the wire.
#[derive(Deserialize, Serialize)]
struct Envelope {
    error: String,
    error_description: String,
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as SerdeError;

        let Ok(envelope) = serde_json::from_str::<Envelope>(&self.to_string()) else {
            return Err(SerdeError::custom("issue serializing error"));
        };
        envelope.serialize(serializer)
    }
}

/// Construct an `Error::InvalidRequest` from a format string.
#[macro_export]
macro_rules! invalid {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::InvalidRequest(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::error::Error::InvalidRequest(format!($err))
    };
}

/// Construct an `Error::ServerError` from a format string.
#[macro_export]
macro_rules! server {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::ServerError(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::error::Error::ServerError(format!($err))
    };
}
