//! # Authorization Core
//!
//! Role-based access decisions rooted at the threat model. Roles form the
//! lattice `reader < writer < owner` and cascade to every sub-resource;
//! administrator grants are an orthogonal override conferring
//! owner-equivalent rights everywhere.
//!
//! The same [`check`] is used by the REST surface and the real-time
//! channel, so a principal's effective role is decided identically on
//! both paths.

pub mod admin;
pub mod check;
pub mod role;

pub use self::admin::{AdminCache, AdminGrant, AdminStore, GranteeRef};
pub use self::check::{Decision, check, ensure, resolve_role};
pub use self::role::Role;
