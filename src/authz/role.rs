//! # Roles
//!
//! The role lattice. Ordering is meaningful: a role grants everything a
//! lesser role grants.

use serde::{Deserialize, Serialize};

/// Role of a subject on a threat model and, by inheritance, on all of its
/// sub-resources.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// List and read.
    #[default]
    Reader,

    /// Read, plus create and update of sub-resources.
    Writer,

    /// Everything, plus deletion of the threat model and mutation of its
    /// authorization list.
    Owner,
}

impl Role {
    /// Whether this role grants at least `required`.
    #[must_use]
    pub fn allows(self, required: Self) -> bool {
        self >= required
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reader => write!(f, "reader"),
            Self::Writer => write!(f, "writer"),
            Self::Owner => write!(f, "owner"),
        }
    }
}
