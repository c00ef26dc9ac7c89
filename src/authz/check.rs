//! # Access Checks
//!
//! Resolves a principal's effective role on a threat model and decides
//! whether a requested action is permitted. A principal with no role at
//! all is indistinguishable from an absent threat model, so callers
//! cannot enumerate resources they hold no role on.

use uuid::Uuid;

use crate::authz::admin::{AdminCache, AdminStore};
use crate::authz::role::Role;
use crate::error::{Error, Result};
use crate::identity::types::Principal;
use crate::resource::provider::ResourceStore;
use crate::resource::types::{SubjectType, ThreatModel};
use crate::server;

/// Outcome of an access check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Permitted, with the principal's effective role.
    Allowed(Role),

    /// The principal holds a role, but not the required one.
    Forbidden,

    /// The threat model does not exist, or the principal holds no role on
    /// it.
    NotFound,
}

/// The principal's effective role on a threat model: the maximum of its
/// user entries, group entries, the owner field, and the administrator
/// override.
#[must_use]
pub fn resolve_role(
    principal: &Principal, threat_model: &ThreatModel, is_admin: bool,
) -> Option<Role> {
    if is_admin || threat_model.owner == principal.provider_id {
        return Some(Role::Owner);
    }

    threat_model
        .authorization
        .iter()
        .filter(|entry| match entry.subject_type {
            SubjectType::User => entry.subject == principal.provider_id,
            SubjectType::Group => principal.groups.contains(&entry.subject),
        })
        .map(|entry| entry.role)
        .max()
}

/// Decide whether `principal` may act on `threat_model_id` with at least
/// `required`.
///
/// # Errors
///
/// Returns `server_error` when the stores are unavailable.
pub async fn check(
    provider: &(impl ResourceStore + AdminStore), admins: &AdminCache, principal: &Principal,
    threat_model_id: Uuid, required: Role,
) -> Result<Decision> {
    let Some(threat_model) = provider
        .threat_model(threat_model_id)
        .await
        .map_err(|e| server!("issue getting threat model: {e}"))?
    else {
        return Ok(Decision::NotFound);
    };

    let is_admin = admins.is_admin(provider, principal).await?;
    match resolve_role(principal, &threat_model, is_admin) {
        None => Ok(Decision::NotFound),
        Some(role) if role.allows(required) => Ok(Decision::Allowed(role)),
        Some(_) => Ok(Decision::Forbidden),
    }
}

/// Like [`check`], but maps the decision to an error and returns the
/// threat model record for permitted callers.
///
/// # Errors
///
/// Returns `not_found` or `forbidden` per the decision, `server_error`
/// when the stores are unavailable.
pub async fn ensure(
    provider: &(impl ResourceStore + AdminStore), admins: &AdminCache, principal: &Principal,
    threat_model_id: Uuid, required: Role,
) -> Result<ThreatModel> {
    let Some(threat_model) = provider
        .threat_model(threat_model_id)
        .await
        .map_err(|e| server!("issue getting threat model: {e}"))?
    else {
        return Err(Error::NotFound("threat model not found".to_string()));
    };

    let is_admin = admins.is_admin(provider, principal).await?;
    match resolve_role(principal, &threat_model, is_admin) {
        None => Err(Error::NotFound("threat model not found".to_string())),
        Some(role) if role.allows(required) => Ok(threat_model),
        Some(role) => {
            tracing::warn!(
                principal = %principal.id, %role, required = %required,
                "insufficient role"
            );
            Err(Error::Forbidden("insufficient role".to_string()))
        }
    }
}
