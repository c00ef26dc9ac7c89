//! # Resource Records
//!
//! The root aggregate and its sub-resources. Timestamps are
//! server-assigned and monotone non-decreasing per record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::authz::Role;
use crate::error::{Error, Result};

/// The root aggregate: groups diagrams, threats, and documentation for a
/// system's security analysis. Holds the only authorization list in its
/// subtree.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ThreatModel {
    /// Record id.
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Methodology tag (STRIDE, LINDDUN, ...).
    #[serde(default)]
    pub framework: String,

    /// Provider-scoped id of the owning principal. Always effectively an
    /// owner regardless of list contents.
    pub owner: String,

    /// Ordered authorization entries. Exactly one carries the `owner`
    /// role, and it names the same subject as `owner`.
    #[serde(default)]
    pub authorization: Vec<AuthorizationEntry>,

    /// Creation time, server-assigned.
    pub created_at: DateTime<Utc>,

    /// Last modification time, server-assigned, never decreasing.
    pub modified_at: DateTime<Utc>,
}

impl ThreatModel {
    /// Advance `modified_at`, keeping it monotone.
    pub fn touch(&mut self) {
        self.modified_at = self.modified_at.max(Utc::now());
    }

    /// Validate a prospective authorization list: no duplicate
    /// `(subject, subject_type)` pairs, exactly one `owner` entry.
    ///
    /// # Errors
    ///
    /// Returns `conflict` for duplicates and `invalid_input` when the
    /// list would not leave exactly one owner.
    pub fn validate_authorization(entries: &[AuthorizationEntry]) -> Result<()> {
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i]
                .iter()
                .any(|e| e.subject == entry.subject && e.subject_type == entry.subject_type)
            {
                return Err(Error::Conflict(format!(
                    "duplicate authorization subject: {}",
                    entry.subject
                )));
            }
        }

        let owners = entries.iter().filter(|e| e.role == Role::Owner).count();
        if owners != 1 {
            return Err(Error::InvalidInput(
                "authorization must leave exactly one owner".to_string(),
            ));
        }

        Ok(())
    }

    /// Replace the authorization list. The owner field follows the list's
    /// single owner entry, so ownership changes are expressed through the
    /// list.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::validate_authorization`] failures.
    pub fn apply_authorization(&mut self, entries: Vec<AuthorizationEntry>) -> Result<()> {
        Self::validate_authorization(&entries)?;

        // the single owner entry names the owner
        if let Some(owner_entry) = entries.iter().find(|e| e.role == Role::Owner) {
            self.owner = owner_entry.subject.clone();
        }
        self.authorization = entries;
        self.touch();
        Ok(())
    }
}

/// One entry in a threat model's authorization list.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthorizationEntry {
    /// Provider-scoped user id or group name.
    pub subject: String,

    /// Whether `subject` names a user or a group.
    pub subject_type: SubjectType,

    /// Granted role.
    pub role: Role,
}

/// Subject kinds for authorization entries.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    /// A single principal, by provider-scoped id.
    #[default]
    User,

    /// Every principal carrying the named group.
    Group,
}

/// A diagram owned by a threat model. The only sub-resource with
/// real-time collaborative editing.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Diagram {
    /// Record id.
    pub id: Uuid,

    /// Owning threat model.
    pub threat_model_id: Uuid,

    /// Display name.
    pub name: String,

    /// Diagram kind.
    #[serde(default)]
    pub kind: DiagramKind,

    /// Optimistic concurrency vector; increases strictly by one on every
    /// accepted mutation.
    #[serde(default)]
    pub update_vector: u64,

    /// Cell payload, opaque to the core beyond cell identity.
    #[serde(default)]
    pub cells: Vec<Cell>,

    /// Creation time, server-assigned.
    pub created_at: DateTime<Utc>,

    /// Last modification time, server-assigned, never decreasing.
    pub modified_at: DateTime<Utc>,
}

impl Diagram {
    /// Advance `modified_at`, keeping it monotone.
    pub fn touch(&mut self) {
        self.modified_at = self.modified_at.max(Utc::now());
    }
}

/// Diagram kinds.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiagramKind {
    /// Data flow diagram.
    #[default]
    Dfd,
}

/// One diagram cell: an id plus an opaque structured payload.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Cell {
    /// Cell id, unique within the diagram.
    pub id: String,

    /// Cell content, passed through untouched.
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

/// A structured patch over cells: full replacement of the affected cells
/// plus removals, applied deterministically.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CellPatch {
    /// Cells to insert or replace, by id.
    #[serde(default)]
    pub upsert: Vec<Cell>,

    /// Cell ids to remove.
    #[serde(default)]
    pub remove: Vec<String>,
}

impl CellPatch {
    /// Apply the patch: removals first, then upserts in order.
    pub fn apply(&self, cells: &mut Vec<Cell>) {
        cells.retain(|c| !self.remove.contains(&c.id));
        for cell in &self.upsert {
            match cells.iter_mut().find(|c| c.id == cell.id) {
                Some(existing) => *existing = cell.clone(),
                None => cells.push(cell.clone()),
            }
        }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.remove.is_empty()
    }
}

/// An identified threat against an element of the analyzed system.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Threat {
    /// Record id.
    pub id: Uuid,

    /// Owning threat model.
    pub threat_model_id: Uuid,

    /// Short title.
    pub name: String,

    /// Narrative description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Severity label.
    #[serde(default)]
    pub severity: String,

    /// Whether the threat has been mitigated.
    #[serde(default)]
    pub mitigated: bool,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

/// A document attached to a threat model.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Document {
    /// Record id.
    pub id: Uuid,

    /// Owning threat model.
    pub threat_model_id: Uuid,

    /// Display name.
    pub name: String,

    /// Document URL.
    pub url: String,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

/// An asset within the analyzed system.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Asset {
    /// Record id.
    pub id: Uuid,

    /// Owning threat model.
    pub threat_model_id: Uuid,

    /// Display name.
    pub name: String,

    /// Asset classification.
    #[serde(default)]
    pub classification: String,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

/// A free-text note on a threat model.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Note {
    /// Record id.
    pub id: Uuid,

    /// Owning threat model.
    pub threat_model_id: Uuid,

    /// Note content.
    pub content: String,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

/// A source repository linked to a threat model.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Repository {
    /// Record id.
    pub id: Uuid,

    /// Owning threat model.
    pub threat_model_id: Uuid,

    /// Repository URL.
    pub url: String,

    /// Branch or ref of interest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last modification time.
    pub modified_at: DateTime<Utc>,
}

/// A key/value metadata entry on a threat model.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MetadataEntry {
    /// Record id.
    pub id: Uuid,

    /// Owning threat model.
    pub threat_model_id: Uuid,

    /// Entry key.
    pub key: String,

    /// Entry value.
    pub value: String,
}
