//! An API for real-time collaborative diagram editing.
//!
//! # Real-Time Collaboration Core
//!
//! Each diagram under edit gets one session and one worker task. The
//! worker owns the diagram's authoritative state and a single-consumer
//! inbound queue, so accepted operations are totally ordered per diagram
//! and every participant observes broadcasts in that order, exactly once.
//! Different diagrams run concurrently on independent workers.
//!
//! Operations are admitted under optimistic concurrency: a client submits
//! the `update_vector` it based its edit on, a match applies the edit and
//! advances the vector by one, a mismatch returns the authoritative state
//! to rebase onto. Persistence happens synchronously before the
//! acknowledgement; a failed write rejects the operation and leaves the
//! vector unchanged.
//!
//! While a session is active, REST mutations of the diagram (and deletion
//! of its parent threat model) are refused with `conflict`; the hub
//! answers that interlock through the
//! [`SessionGate`](crate::resource::provider::SessionGate) seam.

pub mod hub;
pub mod message;
pub mod provider;
pub mod session;

pub use self::hub::{CollabConfig, CollabHub};
pub use self::message::{ClientMessage, ParticipantInfo, RejectReason, ServerMessage};
pub use self::session::SessionSummary;
