//! # Collaboration Hub
//!
//! Process-wide registry of active sessions, one per diagram. The hub
//! admits sessions and participants (validating bearer tokens and taking
//! role snapshots), routes channel messages to the owning session worker,
//! and answers the REST interlock through
//! [`SessionGate`](crate::resource::provider::SessionGate).
//!
//! The hub is explicitly constructed and injected, never a singleton: it
//! must exist before the request pipeline accepts traffic and is drained
//! on shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::authz::{AdminCache, Decision, Role, check};
use crate::collab::message::{ClientMessage, ServerMessage};
use crate::collab::provider::Provider;
use crate::collab::session::{Command, Participant, Session, SessionSummary};
use crate::error::{Error, Result};
use crate::identity::provider::Subject;
use crate::identity::token::{self, Claims, TokenKind};
use crate::identity::types::Principal;
use crate::resource::provider::{ResourceStore, SessionGate};
use crate::server;

/// Collaboration configuration, read once at startup.
#[derive(Clone, Copy, Debug)]
pub struct CollabConfig {
    /// End a session after this much inactivity.
    pub idle_timeout: Duration,

    /// How often workers check for inactivity.
    pub sweep_interval: Duration,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

pub(crate) struct SessionHandle {
    pub session_id: Uuid,
    pub threat_model_id: Uuid,
    pub host: Uuid,
    pub inbound: mpsc::UnboundedSender<Command>,
    pub info: Arc<Mutex<SessionSummary>>,
}

/// The per-diagram session hub.
#[derive(Clone)]
pub struct CollabHub<P> {
    provider: P,
    admins: AdminCache,
    config: CollabConfig,
    sessions: Arc<Mutex<HashMap<Uuid, SessionHandle>>>,
}

impl<P: Provider> CollabHub<P> {
    /// Returns a new hub with no active sessions.
    pub fn new(provider: P, admins: AdminCache, config: CollabConfig) -> Self {
        Self {
            provider,
            admins,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a session for a diagram. The caller must hold writer or
    /// owner on the parent threat model and becomes host and presenter.
    ///
    /// # Errors
    ///
    /// Returns `conflict` when a session already exists for the diagram,
    /// `unauthorized`/`forbidden`/`not_found` per the access check.
    pub async fn start(
        &self, bearer_token: &str, threat_model_id: Uuid, diagram_id: Uuid,
    ) -> Result<SessionSummary> {
        let (principal, role, claims) =
            self.admit(bearer_token, threat_model_id, Role::Writer).await?;

        let diagram = self
            .provider
            .diagram(diagram_id)
            .await
            .map_err(|e| server!("issue getting diagram: {e}"))?;
        let Some(diagram) = diagram.filter(|d| d.threat_model_id == threat_model_id) else {
            return Err(Error::NotFound("diagram not found".to_string()));
        };

        let session_id = Uuid::new_v4();
        let summary = SessionSummary {
            session_id,
            diagram_id,
            threat_model_id,
            host: principal.id,
            started_at: Utc::now(),
            presenter_id: Some(principal.id),
            participants: vec![],
        };
        let info = Arc::new(Mutex::new(summary.clone()));

        let host = Participant {
            principal_id: principal.id,
            name: principal.name.clone(),
            role,
            joined_at: Utc::now(),
            fingerprint: token::fingerprint(bearer_token),
            token_exp: claims.exp,
            tx: None,
        };

        let (inbound, receiver) = mpsc::unbounded_channel();
        let session = Session {
            provider: self.provider.clone(),
            session_id,
            host: principal.id,
            diagram,
            presenter: Some(principal.id),
            participants: vec![host],
            accepted: HashMap::new(),
            info: Arc::clone(&info),
            sessions: Arc::clone(&self.sessions),
            idle_timeout: self.config.idle_timeout,
        };

        {
            let mut sessions = self.sessions.lock().expect("lock poisoned");
            if sessions.contains_key(&diagram_id) {
                return Err(Error::Conflict(
                    "a collaboration session is already active for this diagram".to_string(),
                ));
            }
            sessions.insert(diagram_id, SessionHandle {
                session_id,
                threat_model_id,
                host: principal.id,
                inbound,
                info,
            });
        }

        let sweep = self.config.sweep_interval;
        tokio::spawn(session.run(receiver, sweep));

        tracing::info!(session = %session_id, diagram = %diagram_id, "session started");
        Ok(summary)
    }

    /// Join a session, opening the participant's server-message channel.
    /// The first message received is the `join_ack`; a permission
    /// snapshot is taken now and used for every subsequent check in this
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `not_found` when no session is active (or the principal
    /// cannot see the threat model), `unauthorized` for a bad token.
    pub async fn join(
        &self, diagram_id: Uuid, bearer_token: &str,
    ) -> Result<(Uuid, mpsc::UnboundedReceiver<ServerMessage>)> {
        let (session_id, threat_model_id, inbound) = {
            let sessions = self.sessions.lock().expect("lock poisoned");
            let Some(handle) = sessions.get(&diagram_id) else {
                return Err(Error::NotFound("no active session".to_string()));
            };
            (handle.session_id, handle.threat_model_id, handle.inbound.clone())
        };

        let (principal, role, claims) =
            self.admit(bearer_token, threat_model_id, Role::Reader).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let participant = Participant {
            principal_id: principal.id,
            name: principal.name.clone(),
            role,
            joined_at: Utc::now(),
            fingerprint: token::fingerprint(bearer_token),
            token_exp: claims.exp,
            tx: Some(tx),
        };

        inbound
            .send(Command::Join(participant))
            .map_err(|_| Error::NotFound("session has ended".to_string()))?;

        Ok((session_id, rx))
    }

    /// Enqueue a channel message from a joined participant.
    ///
    /// # Errors
    ///
    /// Returns `not_found` when no session is active for the diagram.
    pub fn send(
        &self, diagram_id: Uuid, principal_id: Uuid, message: ClientMessage,
    ) -> Result<()> {
        let sessions = self.sessions.lock().expect("lock poisoned");
        let Some(handle) = sessions.get(&diagram_id) else {
            return Err(Error::NotFound("no active session".to_string()));
        };
        handle
            .inbound
            .send(Command::Message { principal_id, message })
            .map_err(|_| Error::NotFound("session has ended".to_string()))
    }

    /// End a session through the REST surface. Host only.
    ///
    /// # Errors
    ///
    /// Returns `forbidden` for non-hosts, `not_found` when no session is
    /// active.
    pub async fn end(&self, diagram_id: Uuid, bearer_token: &str) -> Result<()> {
        let claims = token::validate_kind(&self.provider, bearer_token, TokenKind::Access).await?;

        let sessions = self.sessions.lock().expect("lock poisoned");
        let Some(handle) = sessions.get(&diagram_id) else {
            return Err(Error::NotFound("no active session".to_string()));
        };
        if handle.host != claims.sub {
            return Err(Error::Forbidden("only the host may end the session".to_string()));
        }
        handle
            .inbound
            .send(Command::End { principal_id: claims.sub })
            .map_err(|_| Error::NotFound("session has ended".to_string()))
    }

    /// A consistent snapshot of the session for a diagram, when one is
    /// active. Serves the REST session-state query.
    #[must_use]
    pub fn session_info(&self, diagram_id: Uuid) -> Option<SessionSummary> {
        let sessions = self.sessions.lock().expect("lock poisoned");
        sessions.get(&diagram_id).map(|h| h.info.lock().expect("lock poisoned").clone())
    }

    /// Drain every session. Called on process shutdown.
    pub fn shutdown(&self) {
        let sessions = self.sessions.lock().expect("lock poisoned");
        for handle in sessions.values() {
            let _ = handle.inbound.send(Command::Shutdown);
        }
    }

    /// Validate the bearer token and check the principal's role on the
    /// threat model, returning the principal and its effective role
    /// snapshot.
    async fn admit(
        &self, bearer_token: &str, threat_model_id: Uuid, required: Role,
    ) -> Result<(Principal, Role, Claims)> {
        let claims = token::validate_kind(&self.provider, bearer_token, TokenKind::Access).await?;
        let principal = Subject::principal(&self.provider, claims.sub)
            .await
            .map_err(|e| server!("issue getting principal: {e}"))?
            .ok_or_else(|| Error::Unauthorized("principal no longer exists".to_string()))?;

        match check(&self.provider, &self.admins, &principal, threat_model_id, required).await? {
            Decision::Allowed(role) => Ok((principal, role, claims)),
            Decision::Forbidden => Err(Error::Forbidden("insufficient role".to_string())),
            Decision::NotFound => Err(Error::NotFound("threat model not found".to_string())),
        }
    }
}

impl<P: Provider> SessionGate for CollabHub<P> {
    fn has_active_session(&self, diagram_id: Uuid) -> bool {
        self.sessions.lock().expect("lock poisoned").contains_key(&diagram_id)
    }
}
