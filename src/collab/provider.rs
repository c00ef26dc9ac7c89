//! # Collaboration Providers
//!
//! The collaboration hub reaches persistence, authorization data, token
//! validation, and principal records through the same provider traits as
//! the rest of the core.

use crate::authz::admin::AdminStore;
use crate::identity::provider::{Blocklist, Keyring, Subject};
use crate::resource::provider::ResourceStore;

/// Collaboration Provider trait.
pub trait Provider:
    ResourceStore + AdminStore + Blocklist + Keyring + Subject + Clone + Send + Sync + 'static
{
}

/// A blanket implementation for `Provider` trait so that any type
/// implementing the required super traits is considered a `Provider`.
impl<T> Provider for T where
    T: ResourceStore + AdminStore + Blocklist + Keyring + Subject + Clone + Send + Sync + 'static
{
}
