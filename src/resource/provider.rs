//! # Resource Providers
//!
//! Storage and coordination seams for the resource hierarchy. The store
//! emits authoritative records; the core never caches them across
//! requests.

use std::future::Future;

use anyhow::Result;
use uuid::Uuid;

use crate::resource::types::{Diagram, ThreatModel};

/// `ResourceStore` persists threat models and diagrams. Implementations
/// must forbid orphan creation (a diagram whose parent is absent) and
/// enforce the diagram `update_vector` when one is expected.
pub trait ResourceStore: Send + Sync {
    /// Look up a threat model.
    fn threat_model(&self, id: Uuid) -> impl Future<Output = Result<Option<ThreatModel>>> + Send;

    /// Create or replace a threat model.
    fn put_threat_model(&self, threat_model: &ThreatModel)
    -> impl Future<Output = Result<()>> + Send;

    /// Delete a threat model, cascading every child record.
    fn delete_threat_model(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send;

    /// All diagrams owned by a threat model.
    fn diagrams(&self, threat_model_id: Uuid) -> impl Future<Output = Result<Vec<Diagram>>> + Send;

    /// Look up a diagram.
    fn diagram(&self, id: Uuid) -> impl Future<Output = Result<Option<Diagram>>> + Send;

    /// Create or replace a diagram. When `expected_vector` is supplied
    /// the write must fail unless the stored record still carries that
    /// vector.
    fn put_diagram(
        &self, diagram: &Diagram, expected_vector: Option<u64>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete a diagram.
    fn delete_diagram(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send;
}

/// Answers whether a diagram currently has an active collaboration
/// session. Implemented by the collaboration hub; REST mutations consult
/// it before dispatching.
pub trait SessionGate: Send + Sync {
    /// Whether a session is active for the diagram.
    fn has_active_session(&self, diagram_id: Uuid) -> bool;
}
