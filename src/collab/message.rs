//! # Channel Messages
//!
//! The JSON wire protocol for the per-diagram collaboration channel. Each
//! message is an object with a `type` discriminator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::authz::Role;
use crate::resource::types::{Cell, CellPatch};

/// Messages a participant sends to the session.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A mutating diagram edit, admitted under optimistic concurrency.
    Operation {
        /// Client-generated id; replays of an accepted id re-ack without
        /// re-applying.
        client_op_id: String,

        /// The diagram vector the client based its edit on.
        expected_update_vector: u64,

        /// The edit itself.
        patch: CellPatch,
    },

    /// Cursor or selection update. The only message readers may send.
    Presence {
        /// Opaque presence payload, relayed untouched.
        data: Value,
    },

    /// Ask the host for presenter mode.
    PresenterRequest,

    /// Transfer presenter mode. Only the host or the current presenter
    /// may send this.
    PresenterChanged {
        /// The new presenter.
        presenter_id: Uuid,
    },

    /// Host denies a presenter request.
    PresenterDenied {
        /// The denied requester.
        participant_id: Uuid,
    },

    /// Leave the session.
    Leave,

    /// End the session. Host only.
    EndSession,
}

/// Messages the session sends to participants.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message after a successful join: the participant list and
    /// authoritative diagram state.
    JoinAck {
        /// Session id.
        session_id: Uuid,

        /// Everyone currently in the session, joiner included.
        participants: Vec<ParticipantInfo>,

        /// Current presenter, when one is set.
        #[serde(skip_serializing_if = "Option::is_none")]
        presenter_id: Option<Uuid>,

        /// Authoritative vector.
        update_vector: u64,

        /// Authoritative cells.
        cells: Vec<Cell>,
    },

    /// A participant joined.
    ParticipantJoined {
        /// The joiner.
        participant: ParticipantInfo,
    },

    /// A participant left or was disconnected.
    ParticipantLeft {
        /// The departed principal.
        principal_id: Uuid,
    },

    /// The submitter's operation was applied.
    OperationAccepted {
        /// Echo of the client-generated id.
        client_op_id: String,

        /// The vector after applying.
        new_update_vector: u64,
    },

    /// The submitter's operation was not applied.
    OperationRejected {
        /// Echo of the client-generated id.
        client_op_id: String,

        /// Why.
        reason: RejectReason,

        /// Authoritative vector, on conflict.
        #[serde(skip_serializing_if = "Option::is_none")]
        current_update_vector: Option<u64>,

        /// Authoritative cells to rebase onto, on conflict.
        #[serde(skip_serializing_if = "Option::is_none")]
        current_state: Option<Vec<Cell>>,
    },

    /// An accepted operation, broadcast to every participant exactly once
    /// and in admission order.
    StateBroadcast {
        /// The vector after applying.
        new_update_vector: u64,

        /// The applied patch.
        patch: CellPatch,
    },

    /// Relayed presence update.
    Presence {
        /// Originating participant.
        principal_id: Uuid,

        /// Opaque presence payload.
        data: Value,
    },

    /// A participant asked for presenter mode; relayed to the host.
    PresenterRequest {
        /// The requester.
        principal_id: Uuid,
    },

    /// Presenter mode changed hands.
    PresenterChanged {
        /// The new presenter.
        presenter_id: Uuid,
    },

    /// The host denied a presenter request.
    PresenterDenied {
        /// The denied requester.
        participant_id: Uuid,
    },

    /// The session ended: host action, host departure, or idle timeout.
    EndSession,
}

/// Why an operation was rejected.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    /// `expected_update_vector` did not match; rebase and retry.
    Conflict,

    /// The participant's join-time snapshot does not allow writes.
    Unauthorized,

    /// Persistence failed; the vector did not advance.
    Server,
}

/// A participant as seen on the wire.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ParticipantInfo {
    /// Principal id.
    pub principal_id: Uuid,

    /// Display name.
    pub name: String,

    /// Role snapshot taken at join.
    pub role: Role,

    /// Whether this participant is the session host.
    pub host: bool,

    /// Whether this participant is the current presenter.
    pub presenter: bool,

    /// Join time.
    pub joined_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn operation_wire_format() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "operation",
            "client_op_id": "op-1",
            "expected_update_vector": 7,
            "patch": {"upsert": [{"id": "c1", "shape": "process"}], "remove": []}
        }))
        .unwrap();

        let ClientMessage::Operation { client_op_id, expected_update_vector, patch } = msg else {
            panic!("expected operation");
        };
        assert_eq!(client_op_id, "op-1");
        assert_eq!(expected_update_vector, 7);
        assert_eq!(patch.upsert[0].id, "c1");
    }

    #[test]
    fn rejected_omits_absent_state() {
        let msg = ServerMessage::OperationRejected {
            client_op_id: "op-2".to_string(),
            reason: RejectReason::Unauthorized,
            current_update_vector: None,
            current_state: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "operation_rejected");
        assert_eq!(json["reason"], "unauthorized");
        assert!(json.get("current_update_vector").is_none());
    }
}
