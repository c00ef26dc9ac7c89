//! An API for multi-tenant collaborative threat modeling: federated
//! authentication (OAuth 2.0 Authorization Code with PKCE, SAML 2.0),
//! role-based authorization rooted at the threat model, and real-time
//! conflict-resolving diagram editing.
//!
//! The crate is transport-agnostic: each operation is a typed
//! request/response pair routed through an `endpoint::handle` entry
//! point or a hub method, and all externals (storage, caches, outbound
//! provider calls, signing keys) are supplied through `Provider` traits.
//! Surfacing the API over HTTP is a few lines of wrapper per route.

pub mod authz;
pub mod collab;
pub mod core;
pub mod error;
pub mod identity;
pub mod oauth;
pub mod resource;

pub use crate::error::{Error, Result};
