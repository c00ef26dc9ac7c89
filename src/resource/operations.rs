//! # Resource Operations
//!
//! The REST-path operations whose semantics belong to the core: threat
//! model lifecycle, authorization-list mutation, and diagram mutation
//! under optimistic concurrency, all guarded by the same access checks as
//! the real-time channel and interlocked against active collaboration
//! sessions.
//!
//! Reads are never blocked by a session; mutations of a diagram (and
//! deletion of its parent threat model) conflict while one is active.

use chrono::Utc;
use uuid::Uuid;

use crate::authz::{AdminCache, AdminStore, Role, ensure};
use crate::error::{Error, Result};
use crate::identity::types::Principal;
use crate::resource::provider::{ResourceStore, SessionGate};
use crate::resource::types::{
    AuthorizationEntry, Diagram, DiagramKind, SubjectType, ThreatModel,
};
use crate::server;

/// Create a threat model. Any authenticated principal may create one and
/// becomes its owner.
///
/// # Errors
///
/// Returns `server_error` when the store is unavailable.
pub async fn create_threat_model(
    provider: &impl ResourceStore, principal: &Principal, name: &str,
    description: Option<String>, framework: &str,
) -> Result<ThreatModel> {
    let now = Utc::now();
    let threat_model = ThreatModel {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description,
        framework: framework.to_string(),
        owner: principal.provider_id.clone(),
        authorization: vec![AuthorizationEntry {
            subject: principal.provider_id.clone(),
            subject_type: SubjectType::User,
            role: Role::Owner,
        }],
        created_at: now,
        modified_at: now,
    };

    provider
        .put_threat_model(&threat_model)
        .await
        .map_err(|e| server!("issue saving threat model: {e}"))?;
    Ok(threat_model)
}

/// Read a threat model. Requires reader.
///
/// # Errors
///
/// Returns `not_found` when absent or the principal holds no role.
pub async fn get_threat_model(
    provider: &(impl ResourceStore + AdminStore), admins: &AdminCache, principal: &Principal,
    id: Uuid,
) -> Result<ThreatModel> {
    ensure(provider, admins, principal, id, Role::Reader).await
}

/// Replace a threat model's descriptive fields. Requires writer; touching
/// the authorization list or ownership requires owner.
///
/// # Errors
///
/// Returns `forbidden` for non-owner authorization changes, `conflict` or
/// `invalid_input` for an invalid list.
pub async fn update_threat_model(
    provider: &(impl ResourceStore + AdminStore), admins: &AdminCache, principal: &Principal,
    update: ThreatModel,
) -> Result<ThreatModel> {
    let mut stored = ensure(provider, admins, principal, update.id, Role::Writer).await?;

    let authorization_changed =
        update.authorization != stored.authorization || update.owner != stored.owner;
    if authorization_changed {
        // only the owner may touch the list; `ensure` grants admins owner
        ensure(provider, admins, principal, update.id, Role::Owner).await?;
        stored.apply_authorization(update.authorization)?;
    }

    stored.name = update.name;
    stored.description = update.description;
    stored.framework = update.framework;
    stored.touch();

    provider
        .put_threat_model(&stored)
        .await
        .map_err(|e| server!("issue saving threat model: {e}"))?;
    Ok(stored)
}

/// Replace a threat model's authorization list. Owner only.
///
/// # Errors
///
/// Returns `forbidden` for non-owners, `conflict` for duplicate subjects,
/// `invalid_input` when the list would not leave exactly one owner.
pub async fn patch_authorization(
    provider: &(impl ResourceStore + AdminStore), admins: &AdminCache, principal: &Principal,
    id: Uuid, entries: Vec<AuthorizationEntry>,
) -> Result<ThreatModel> {
    let mut stored = ensure(provider, admins, principal, id, Role::Owner).await?;

    stored.apply_authorization(entries)?;
    provider
        .put_threat_model(&stored)
        .await
        .map_err(|e| server!("issue saving threat model: {e}"))?;
    Ok(stored)
}

/// Delete a threat model, cascading children. Owner only, and refused
/// while any child diagram has an active collaboration session.
///
/// # Errors
///
/// Returns `conflict` while a session is active.
pub async fn delete_threat_model(
    provider: &(impl ResourceStore + AdminStore), gate: &impl SessionGate, admins: &AdminCache,
    principal: &Principal, id: Uuid,
) -> Result<()> {
    ensure(provider, admins, principal, id, Role::Owner).await?;

    let diagrams =
        provider.diagrams(id).await.map_err(|e| server!("issue listing diagrams: {e}"))?;
    if diagrams.iter().any(|d| gate.has_active_session(d.id)) {
        return Err(Error::Conflict(
            "Cannot delete threat model while a diagram has an active collaboration session; \
             end the session first"
                .to_string(),
        ));
    }

    provider.delete_threat_model(id).await.map_err(|e| server!("issue deleting threat model: {e}"))
}

/// Create a diagram under a threat model. Requires writer.
///
/// # Errors
///
/// Returns `not_found` when the parent is absent or unreadable.
pub async fn create_diagram(
    provider: &(impl ResourceStore + AdminStore), admins: &AdminCache, principal: &Principal,
    threat_model_id: Uuid, name: &str, kind: DiagramKind,
) -> Result<Diagram> {
    ensure(provider, admins, principal, threat_model_id, Role::Writer).await?;

    let now = Utc::now();
    let diagram = Diagram {
        id: Uuid::new_v4(),
        threat_model_id,
        name: name.to_string(),
        kind,
        update_vector: 0,
        cells: vec![],
        created_at: now,
        modified_at: now,
    };

    provider
        .put_diagram(&diagram, None)
        .await
        .map_err(|e| server!("issue saving diagram: {e}"))?;
    Ok(diagram)
}

/// Read a diagram. Requires reader. Never blocked by a session.
///
/// # Errors
///
/// Returns `not_found` when absent, orphaned, or unreadable.
pub async fn get_diagram(
    provider: &(impl ResourceStore + AdminStore), admins: &AdminCache, principal: &Principal,
    threat_model_id: Uuid, diagram_id: Uuid,
) -> Result<Diagram> {
    ensure(provider, admins, principal, threat_model_id, Role::Reader).await?;
    fetch_child(provider, threat_model_id, diagram_id).await
}

/// Replace a diagram. Requires writer, refused while a session is active,
/// and optimistic: the update's `update_vector` must match the stored
/// record, and the accepted write advances it by one.
///
/// # Errors
///
/// Returns `conflict` for an active session or a vector mismatch.
pub async fn update_diagram(
    provider: &(impl ResourceStore + AdminStore), gate: &impl SessionGate, admins: &AdminCache,
    principal: &Principal, update: Diagram,
) -> Result<Diagram> {
    ensure(provider, admins, principal, update.threat_model_id, Role::Writer).await?;
    let stored = fetch_child(provider, update.threat_model_id, update.id).await?;

    if gate.has_active_session(update.id) {
        return Err(Error::Conflict(
            "Diagram has an active collaboration session; end the session first".to_string(),
        ));
    }
    if update.update_vector != stored.update_vector {
        return Err(Error::Conflict(format!(
            "update_vector mismatch: current is {}",
            stored.update_vector
        )));
    }

    let mut diagram = Diagram {
        created_at: stored.created_at,
        update_vector: stored.update_vector + 1,
        ..update
    };
    diagram.touch();

    provider
        .put_diagram(&diagram, Some(stored.update_vector))
        .await
        .map_err(|e| server!("issue saving diagram: {e}"))?;
    Ok(diagram)
}

/// Delete a diagram. Requires writer and no active session.
///
/// # Errors
///
/// Returns `conflict` while a session is active.
pub async fn delete_diagram(
    provider: &(impl ResourceStore + AdminStore), gate: &impl SessionGate, admins: &AdminCache,
    principal: &Principal, threat_model_id: Uuid, diagram_id: Uuid,
) -> Result<()> {
    ensure(provider, admins, principal, threat_model_id, Role::Writer).await?;
    fetch_child(provider, threat_model_id, diagram_id).await?;

    if gate.has_active_session(diagram_id) {
        return Err(Error::Conflict(
            "Diagram has an active collaboration session; end the session first".to_string(),
        ));
    }

    provider.delete_diagram(diagram_id).await.map_err(|e| server!("issue deleting diagram: {e}"))
}

/// A child is only visible through its own parent; a mismatched parent is
/// indistinguishable from absence.
async fn fetch_child(
    provider: &impl ResourceStore, threat_model_id: Uuid, diagram_id: Uuid,
) -> Result<Diagram> {
    let diagram = provider
        .diagram(diagram_id)
        .await
        .map_err(|e| server!("issue getting diagram: {e}"))?;

    match diagram {
        Some(d) if d.threat_model_id == threat_model_id => Ok(d),
        _ => Err(Error::NotFound("diagram not found".to_string())),
    }
}
