//! # Session Worker
//!
//! One task per active session owns the diagram's authoritative state and
//! an inbound queue of commands from all connected participants,
//! processing them one at a time in arrival order. This yields a total
//! order of accepted operations per diagram without coarse locking;
//! different diagrams run on independent workers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::authz::Role;
use crate::collab::hub::SessionHandle;
use crate::collab::message::{ClientMessage, ParticipantInfo, RejectReason, ServerMessage};
use crate::collab::provider::Provider;
use crate::identity::provider::Blocklist;
use crate::resource::provider::ResourceStore;
use crate::resource::types::{CellPatch, Diagram};

/// A consistent, externally readable snapshot of a session.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    /// Session id.
    pub session_id: Uuid,

    /// The diagram this session edits.
    pub diagram_id: Uuid,

    /// The diagram's parent threat model.
    pub threat_model_id: Uuid,

    /// The hosting principal.
    pub host: Uuid,

    /// Session start time.
    pub started_at: DateTime<Utc>,

    /// Current presenter, when one is set.
    pub presenter_id: Option<Uuid>,

    /// Everyone currently in the session.
    pub participants: Vec<ParticipantInfo>,
}

/// A session participant. The role is a snapshot taken at join and used
/// for every authorization decision in this session; revocation effects
/// are observed on the next join.
#[derive(Debug)]
pub(crate) struct Participant {
    pub principal_id: Uuid,
    pub name: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
    pub fingerprint: String,
    pub token_exp: i64,
    /// Outbound queue; `None` until the participant opens its channel.
    pub tx: Option<mpsc::UnboundedSender<ServerMessage>>,
}

/// Commands feeding the worker's inbound queue.
#[derive(Debug)]
pub(crate) enum Command {
    Join(Participant),
    Message { principal_id: Uuid, message: ClientMessage },
    End { principal_id: Uuid },
    Shutdown,
}

pub(crate) struct Session<P> {
    pub provider: P,
    pub session_id: Uuid,
    pub host: Uuid,
    pub diagram: Diagram,
    pub presenter: Option<Uuid>,
    pub participants: Vec<Participant>,
    /// Accepted operations by `(principal, client_op_id)`: replays re-ack
    /// with the original vector without re-applying.
    pub accepted: HashMap<(Uuid, String), u64>,
    pub info: Arc<Mutex<SessionSummary>>,
    pub sessions: Arc<Mutex<HashMap<Uuid, SessionHandle>>>,
    pub idle_timeout: Duration,
}

impl<P: Provider> Session<P> {
    /// Process commands until the session ends: host action, host
    /// departure, queue closure, or idle timeout.
    pub async fn run(mut self, mut inbound: mpsc::UnboundedReceiver<Command>, sweep: Duration) {
        let mut last_activity = Instant::now();
        let mut ticker = tokio::time::interval(sweep);

        loop {
            tokio::select! {
                command = inbound.recv() => {
                    last_activity = Instant::now();
                    let ended = match command {
                        Some(Command::Join(participant)) => self.join(participant),
                        Some(Command::Message { principal_id, message }) => {
                            self.message(principal_id, message).await
                        }
                        Some(Command::End { principal_id }) => self.end_session(principal_id),
                        Some(Command::Shutdown) | None => {
                            self.broadcast(&ServerMessage::EndSession);
                            true
                        }
                    };
                    if ended {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if last_activity.elapsed() >= self.idle_timeout {
                        tracing::info!(session = %self.session_id, "idle timeout, ending session");
                        self.broadcast(&ServerMessage::EndSession);
                        break;
                    }
                }
            }
        }

        self.sessions.lock().expect("lock poisoned").remove(&self.diagram.id);
    }

    fn join(&mut self, participant: Participant) -> bool {
        let principal_id = participant.principal_id;

        // a re-join replaces the previous connection and snapshot
        match self.participants.iter_mut().find(|p| p.principal_id == principal_id) {
            Some(existing) => *existing = participant,
            None => self.participants.push(participant),
        }
        self.publish_info();

        let infos = self.participant_infos();
        let ack = ServerMessage::JoinAck {
            session_id: self.session_id,
            participants: infos.clone(),
            presenter_id: self.presenter,
            update_vector: self.diagram.update_vector,
            cells: self.diagram.cells.clone(),
        };
        self.send_to(principal_id, &ack);

        let Some(joined) = infos.into_iter().find(|p| p.principal_id == principal_id) else {
            return false;
        };
        let failed = self.broadcast_except(principal_id, &ServerMessage::ParticipantJoined {
            participant: joined,
        });
        self.prune_returning_end(&failed)
    }

    async fn message(&mut self, principal_id: Uuid, message: ClientMessage) -> bool {
        let Some(participant) = self.participants.iter().find(|p| p.principal_id == principal_id)
        else {
            tracing::warn!(session = %self.session_id, "message from non-participant");
            return false;
        };

        // revalidate at the message boundary: a token revoked mid-session
        // disconnects on the next message
        let expired = participant.token_exp <= Utc::now().timestamp();
        let revoked = Blocklist::blocked(&self.provider, &participant.fingerprint)
            .await
            .unwrap_or(true);
        if expired || revoked {
            tracing::warn!(session = %self.session_id, principal = %principal_id, "token no longer valid, disconnecting");
            return self.disconnect(principal_id);
        }

        match message {
            ClientMessage::Operation { client_op_id, expected_update_vector, patch } => {
                self.operation(principal_id, client_op_id, expected_update_vector, patch).await
            }
            ClientMessage::Presence { data } => {
                let failed =
                    self.broadcast(&ServerMessage::Presence { principal_id, data });
                self.prune_returning_end(&failed)
            }
            ClientMessage::PresenterRequest => {
                self.send_to(self.host, &ServerMessage::PresenterRequest { principal_id });
                false
            }
            ClientMessage::PresenterChanged { presenter_id } => {
                self.change_presenter(principal_id, presenter_id)
            }
            ClientMessage::PresenterDenied { participant_id } => {
                if principal_id == self.host {
                    self.send_to(participant_id, &ServerMessage::PresenterDenied {
                        participant_id,
                    });
                }
                false
            }
            ClientMessage::Leave => self.disconnect(principal_id),
            ClientMessage::EndSession => self.end_session(principal_id),
        }
    }

    async fn operation(
        &mut self, principal_id: Uuid, client_op_id: String, expected_update_vector: u64,
        patch: CellPatch,
    ) -> bool {
        let role = self
            .participants
            .iter()
            .find(|p| p.principal_id == principal_id)
            .map_or(Role::Reader, |p| p.role);

        // readers may only send presence
        if !role.allows(Role::Writer) {
            self.send_to(principal_id, &ServerMessage::OperationRejected {
                client_op_id,
                reason: RejectReason::Unauthorized,
                current_update_vector: None,
                current_state: None,
            });
            return false;
        }

        // replaying an accepted operation re-acks without re-applying
        let key = (principal_id, client_op_id.clone());
        if let Some(vector) = self.accepted.get(&key) {
            self.send_to(principal_id, &ServerMessage::OperationAccepted {
                client_op_id,
                new_update_vector: *vector,
            });
            return false;
        }

        if expected_update_vector != self.diagram.update_vector {
            self.send_to(principal_id, &ServerMessage::OperationRejected {
                client_op_id,
                reason: RejectReason::Conflict,
                current_update_vector: Some(self.diagram.update_vector),
                current_state: Some(self.diagram.cells.clone()),
            });
            return false;
        }

        // apply to a copy; authoritative state only advances once the
        // write is durable
        let mut updated = self.diagram.clone();
        patch.apply(&mut updated.cells);
        updated.update_vector += 1;
        updated.touch();

        if let Err(e) =
            self.provider.put_diagram(&updated, Some(self.diagram.update_vector)).await
        {
            tracing::warn!(session = %self.session_id, "persistence failed: {e}");
            self.send_to(principal_id, &ServerMessage::OperationRejected {
                client_op_id,
                reason: RejectReason::Server,
                current_update_vector: None,
                current_state: None,
            });
            return false;
        }

        self.diagram = updated;
        self.accepted.insert(key, self.diagram.update_vector);

        self.send_to(principal_id, &ServerMessage::OperationAccepted {
            client_op_id,
            new_update_vector: self.diagram.update_vector,
        });
        let failed = self.broadcast(&ServerMessage::StateBroadcast {
            new_update_vector: self.diagram.update_vector,
            patch,
        });
        self.prune_returning_end(&failed)
    }

    fn change_presenter(&mut self, sender: Uuid, presenter_id: Uuid) -> bool {
        // only the host or the current presenter may transfer
        if sender != self.host && Some(sender) != self.presenter {
            tracing::warn!(session = %self.session_id, principal = %sender, "presenter transfer refused");
            return false;
        }
        if !self.participants.iter().any(|p| p.principal_id == presenter_id) {
            return false;
        }

        self.presenter = Some(presenter_id);
        self.publish_info();
        let failed = self.broadcast(&ServerMessage::PresenterChanged { presenter_id });
        self.prune_returning_end(&failed)
    }

    /// Remove a participant. Ends the session when the host departs.
    fn disconnect(&mut self, principal_id: Uuid) -> bool {
        self.participants.retain(|p| p.principal_id != principal_id);
        if self.presenter == Some(principal_id) {
            self.presenter = None;
        }
        self.publish_info();

        if principal_id == self.host {
            self.broadcast(&ServerMessage::EndSession);
            return true;
        }

        let failed = self.broadcast(&ServerMessage::ParticipantLeft { principal_id });
        self.prune_returning_end(&failed)
    }

    fn end_session(&mut self, principal_id: Uuid) -> bool {
        if principal_id != self.host {
            tracing::warn!(session = %self.session_id, principal = %principal_id, "end refused: not the host");
            return false;
        }
        self.broadcast(&ServerMessage::EndSession);
        true
    }

    fn send_to(&self, principal_id: Uuid, message: &ServerMessage) {
        if let Some(tx) = self
            .participants
            .iter()
            .find(|p| p.principal_id == principal_id)
            .and_then(|p| p.tx.as_ref())
        {
            // a failed send means the channel closed; the next broadcast
            // prunes the participant
            let _ = tx.send(message.clone());
        }
    }

    /// Deliver to every connected participant, returning those whose
    /// channel has closed. Transport failure to one participant does not
    /// affect delivery to others.
    fn broadcast(&self, message: &ServerMessage) -> Vec<Uuid> {
        let mut failed = vec![];
        for participant in &self.participants {
            if let Some(tx) = &participant.tx {
                if tx.send(message.clone()).is_err() {
                    failed.push(participant.principal_id);
                }
            }
        }
        failed
    }

    fn broadcast_except(&self, except: Uuid, message: &ServerMessage) -> Vec<Uuid> {
        let mut failed = vec![];
        for participant in &self.participants {
            if participant.principal_id == except {
                continue;
            }
            if let Some(tx) = &participant.tx {
                if tx.send(message.clone()).is_err() {
                    failed.push(participant.principal_id);
                }
            }
        }
        failed
    }

    /// Drop participants whose channels closed, announcing each
    /// departure. Returns `true` when the host was among them and the
    /// session must end.
    fn prune_returning_end(&mut self, failed: &[Uuid]) -> bool {
        let mut ended = false;
        for principal_id in failed {
            ended |= self.disconnect(*principal_id);
        }
        ended
    }

    fn participant_infos(&self) -> Vec<ParticipantInfo> {
        self.participants
            .iter()
            .map(|p| ParticipantInfo {
                principal_id: p.principal_id,
                name: p.name.clone(),
                role: p.role,
                host: p.principal_id == self.host,
                presenter: self.presenter == Some(p.principal_id),
                joined_at: p.joined_at,
            })
            .collect()
    }

    fn publish_info(&self) {
        let mut info = self.info.lock().expect("lock poisoned");
        info.presenter_id = self.presenter;
        info.participants = self.participant_infos();
    }
}
