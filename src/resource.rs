//! # Resource Hierarchy
//!
//! Threat models and the sub-resources they own. The resource graph is a
//! strict tree rooted at a threat model: every child carries its parent
//! id, no child carries its own authorization, and deletion cascades.
//!
//! This module also owns the authorization-list mutation rules and the
//! REST-path operations whose semantics belong to the core: threat-model
//! lifecycle, diagram mutation with optimistic concurrency, and the
//! interlock against active collaboration sessions.

pub mod operations;
pub mod provider;
pub mod types;

pub use self::provider::{ResourceStore, SessionGate};
pub use self::types::{
    AuthorizationEntry, Cell, CellPatch, Diagram, DiagramKind, SubjectType, ThreatModel,
};
