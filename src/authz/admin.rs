//! # Administrator Grants
//!
//! Out-of-band grants conferring owner-equivalent rights on every threat
//! model. The grant set is read on almost every request, so it is served
//! from a process-wide cache; mutations go through the store and
//! invalidate the cache (write-through).

use std::future::Future;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::types::Principal;
use crate::server;

/// An administrator grant.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct AdminGrant {
    /// Who the grant applies to.
    pub grantee: GranteeRef,

    /// When the grant was created.
    pub created_at: DateTime<Utc>,

    /// Provider-scoped id of the granting administrator.
    pub granted_by: String,
}

/// How a grant names its grantee.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GranteeRef {
    /// By email address.
    Email(String),

    /// By provider-scoped identifier.
    ProviderId {
        /// Provider name.
        provider: String,

        /// Provider-scoped id.
        provider_id: String,
    },

    /// By group name.
    Group(String),
}

impl GranteeRef {
    /// Whether the reference names this principal.
    #[must_use]
    pub fn matches(&self, principal: &Principal) -> bool {
        match self {
            Self::Email(email) => principal.email.as_deref() == Some(email.as_str()),
            Self::ProviderId { provider, provider_id } => {
                &principal.provider == provider && &principal.provider_id == provider_id
            }
            Self::Group(group) => principal.groups.contains(group),
        }
    }
}

/// `AdminStore` persists the administrator grant set.
pub trait AdminStore: Send + Sync {
    /// All grants.
    fn grants(&self) -> impl Future<Output = anyhow::Result<Vec<AdminGrant>>> + Send;

    /// Persist a grant.
    fn put_grant(&self, grant: &AdminGrant) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Remove the grant for a grantee.
    fn delete_grant(&self, grantee: &GranteeRef)
    -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Process-wide, read-mostly cache over the grant set. Clones share the
/// cache. Must be constructed before the request pipeline accepts
/// traffic and injected wherever decisions are made; it is not a
/// singleton so tests stay hermetic.
#[derive(Clone, Debug, Default)]
pub struct AdminCache {
    grants: Arc<RwLock<Option<Vec<AdminGrant>>>>,
}

impl AdminCache {
    /// Returns a new, unpopulated cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current grant set, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns `server_error` when the store is unavailable.
    pub async fn grants(&self, provider: &impl AdminStore) -> Result<Vec<AdminGrant>> {
        if let Some(grants) = self.grants.read().expect("lock poisoned").clone() {
            return Ok(grants);
        }

        let grants =
            provider.grants().await.map_err(|e| server!("issue loading admin grants: {e}"))?;
        *self.grants.write().expect("lock poisoned") = Some(grants.clone());
        Ok(grants)
    }

    /// Whether a principal holds an administrator grant by email,
    /// provider id, or group.
    ///
    /// # Errors
    ///
    /// Returns `server_error` when the store is unavailable.
    pub async fn is_admin(
        &self, provider: &impl AdminStore, principal: &Principal,
    ) -> Result<bool> {
        let grants = self.grants(provider).await?;
        Ok(grants.iter().any(|g| g.grantee.matches(principal)))
    }

    /// Add a grant, write-through. Duplicate grantees are rejected.
    ///
    /// # Errors
    ///
    /// Returns `conflict` for a duplicate grantee, `server_error` when the
    /// store is unavailable.
    pub async fn grant(&self, provider: &impl AdminStore, grant: AdminGrant) -> Result<()> {
        let grants = self.grants(provider).await?;
        if grants.iter().any(|g| g.grantee == grant.grantee) {
            return Err(Error::Conflict("grant already exists".to_string()));
        }

        provider
            .put_grant(&grant)
            .await
            .map_err(|e| server!("issue saving admin grant: {e}"))?;
        self.invalidate();
        Ok(())
    }

    /// Remove a grant, write-through.
    ///
    /// # Errors
    ///
    /// Returns `server_error` when the store is unavailable.
    pub async fn revoke_grant(
        &self, provider: &impl AdminStore, grantee: &GranteeRef,
    ) -> Result<()> {
        provider
            .delete_grant(grantee)
            .await
            .map_err(|e| server!("issue deleting admin grant: {e}"))?;
        self.invalidate();
        Ok(())
    }

    /// Drop the cached set; the next read reloads from the store.
    pub fn invalidate(&self) {
        *self.grants.write().expect("lock poisoned") = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn grantee_matching() {
        let principal = Principal {
            provider: "test".to_string(),
            provider_id: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
            groups: ["security".to_string()].into(),
            ..Principal::default()
        };

        assert!(GranteeRef::Email("alice@example.com".to_string()).matches(&principal));
        assert!(
            GranteeRef::ProviderId {
                provider: "test".to_string(),
                provider_id: "alice".to_string()
            }
            .matches(&principal)
        );
        assert!(GranteeRef::Group("security".to_string()).matches(&principal));
        assert!(!GranteeRef::Group("finance".to_string()).matches(&principal));
    }
}
