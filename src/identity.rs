//! An API for federated authentication and session management.
//!
//! # Identity & Session Core
//!
//! This module translates external authentication events into internal
//! Principals and issues, validates, refreshes, introspects, and revokes
//! the service's own bearer tokens.
//!
//! Federation covers OAuth 2.0 Authorization Code with PKCE (RFC 7636,
//! `S256` only) against any number of registered providers, and SAML 2.0
//! Service Provider bindings. Both paths converge on the same principal
//! mapping and token mint, so a session looks identical regardless of how
//! it was established.
//!
//! # Design
//!
//! **Endpoints**
//!
//! The module is architected around its endpoints, each with its own
//! `XxxRequest` and `XxxResponse` types routed through
//! [`endpoint::handle`]. The types serialize to and from JSON, in
//! accordance with RFC 6749, RFC 7662, and the SAML bindings.
//!
//! Endpoints are designed to be used with Rust-based HTTP servers such as
//! [axum](https://docs.rs/axum/latest/axum/): each route is a few lines of
//! wrapper that deserializes the request, sets any bearer token from the
//! `Authorization` header, and calls `handle`.
//!
//! **Providers**
//!
//! Implementers supply `Provider` traits responsible for externals:
//! provider registrations and configuration, TTL-bearing state storage,
//! the revocation blocklist, principal persistence, outbound calls to the
//! identity provider, and the token signing keys. See [`provider`].
//!
//! # Example
//!
//! ```rust,ignore
//! // `ProviderImpl` implements the `Provider` traits
//! let provider = ProviderImpl::new();
//!
//! // begin a flow: the response carries the provider redirect
//! let request = AuthorizeRequestBuilder::new()
//!     .provider("corporate")
//!     .scope("openid")
//!     .login_hint("alice")
//!     .build();
//! let response = endpoint::handle(request, &provider).await?;
//! ```

pub mod client;
pub mod endpoint;
pub mod provider;
pub mod token;
pub mod types;

mod handlers;
mod saml;
mod state;

pub use self::state::{AuthState, Expire, RelayState, auth_key, relay_key, token_key};
