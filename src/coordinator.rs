//! Connection coordinator: the join/leave/action protocol
//!
//! One coordinator per process. Each connection's transitions
//! (`Disconnected → Connected → Joined → Connected → Disconnected`) are
//! serialized by a per-connection lock so a client racing its own join
//! and leave cannot corrupt registry state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::config::RoomConfig;
use crate::events::{EventSink, ServerEvent};
use crate::game_loop::{self, GameLoopContext};
use crate::registry::Registry;
use crate::session::SessionState;
use crate::types::{ParticipantId, SessionId};

/// What a leave did, so callers can pick the right client-facing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The session was active; it has been torn down for everyone
    EndedActiveGame,
    /// The leaver was the last participant of a waiting session; the
    /// session id was reclaimed immediately
    DissolvedLobby,
    /// A waiting session lost one participant and keeps waiting
    LeftLobby,
    /// The connection was not joined to any session
    NotJoined,
}

/// Protocol handlers for client connection events.
pub struct Coordinator {
    registry: Arc<Registry>,
    sink: Arc<dyn EventSink>,
    config: Arc<RoomConfig>,
    /// Per-connection serialization locks, keyed by identity.
    connections: parking_lot::Mutex<HashMap<ParticipantId, Arc<AsyncMutex<()>>>>,
}

impl Coordinator {
    /// Create a coordinator over a shared registry and event sink.
    pub fn new(registry: Arc<Registry>, sink: Arc<dyn EventSink>) -> Self {
        let config = Arc::clone(registry.config());
        Self {
            registry,
            sink,
            config,
            connections: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Register a connection. Idempotent.
    pub fn on_connect(&self, participant: &ParticipantId) {
        self.connections
            .lock()
            .entry(participant.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())));
    }

    /// Handle an abrupt disconnect: leave any current session silently and
    /// forget the connection.
    pub async fn on_disconnect(&self, participant: &ParticipantId) {
        let Some(lock) = self.connection_lock(participant) else {
            return;
        };
        {
            let _serialized = lock.lock().await;
            self.leave_session(participant).await;
        }
        self.connections.lock().remove(participant);
    }

    /// Handle a join request: match the connection into a waiting session,
    /// creating one if the pool allows.
    pub async fn on_join(&self, participant: &ParticipantId) {
        let Some(lock) = self.connection_lock(participant) else {
            log::warn!("join from unregistered connection {participant}, ignoring");
            return;
        };
        let _serialized = lock.lock().await;

        // Already seated somewhere; a repeated join changes nothing.
        if self.registry.session_for(participant).is_some() {
            log::debug!("{participant} re-sent join while already in a session");
            return;
        }

        loop {
            let session = match self.registry.find_or_create_waiting() {
                Ok(session) => session,
                Err(err) => {
                    log::warn!("join refused for {participant}: {err}");
                    self.sink.send_to(
                        participant,
                        &ServerEvent::CapacityExceeded {
                            error: err.to_string(),
                        },
                    );
                    return;
                }
            };
            let id = session.id();

            let mut state = session.lock().await;
            let Some(slot) = state.random_open_slot() else {
                if self.registry.is_active(id) {
                    // Filled and promoted between resolution and locking;
                    // it has left the waiting list by now, so resolving
                    // again cannot return it.
                    continue;
                }
                // A layout without human seats can never seat anyone.
                log::error!("session {id} has no open seats to assign; check the slot layout");
                return;
            };

            self.sink.join_room(id, participant);
            if let Err(err) = state.add_participant(&slot, participant.clone()) {
                // Unreachable while the session lock is held, kept as a
                // logged no-op per the churn policy.
                log::warn!("seat assignment failed for {participant}: {err}");
                self.sink.leave_room(id, participant);
                return;
            }
            self.registry.bind(participant.clone(), id);
            log::info!("{participant} joined session {id} in slot {slot}");

            if state.is_full() {
                self.registry.promote_to_active(id);
                self.sink.broadcast(
                    id,
                    &ServerEvent::SessionStarted {
                        config: self.config.to_json(),
                    },
                );
                game_loop::spawn(GameLoopContext {
                    session: Arc::clone(&session),
                    registry: Arc::clone(&self.registry),
                    sink: Arc::clone(&self.sink),
                    config: Arc::clone(&self.config),
                });
            } else {
                let status = self.waiting_status(id, &state);
                self.sink.broadcast(id, &status);
            }
            return;
        }
    }

    /// Handle an explicit leave request.
    ///
    /// Returns the outcome classification; the leaver is told whether a
    /// game or merely a lobby ended.
    pub async fn on_leave(&self, participant: &ParticipantId) -> LeaveOutcome {
        let Some(lock) = self.connection_lock(participant) else {
            return LeaveOutcome::NotJoined;
        };
        let _serialized = lock.lock().await;

        let outcome = self.leave_session(participant).await;
        match outcome {
            LeaveOutcome::EndedActiveGame => {
                self.sink.send_to(
                    participant,
                    &ServerEvent::SessionEnded {
                        redirect_url: self.config.redirect_url.clone(),
                        timeout_ms: self.config.redirect_timeout_ms,
                    },
                );
            }
            LeaveOutcome::DissolvedLobby | LeaveOutcome::LeftLobby => {
                self.sink.send_to(participant, &ServerEvent::LobbyClosed);
            }
            LeaveOutcome::NotJoined => {}
        }
        outcome
    }

    /// Handle submitted inputs: the first one with a configured mapping is
    /// buffered for the next tick, the rest are ignored.
    pub async fn on_action(&self, participant: &ParticipantId, pressed_inputs: &[String]) {
        let Some(session) = self.registry.session_for(participant) else {
            return;
        };
        let Some(action) = pressed_inputs
            .iter()
            .find_map(|input| self.config.action_for_input(input))
        else {
            return;
        };
        let mut state = session.lock().await;
        state.enqueue_action(participant, action);
    }

    /// Handle a reset acknowledgment for a pending episode boundary.
    pub fn on_reset_ack(&self, participant: &ParticipantId, session: SessionId) {
        if self.registry.session_id_for(participant) != Some(session) {
            log::debug!("{participant} acknowledged a reset for session {session} it is not in");
            return;
        }
        self.registry.barrier().acknowledge(session, participant);
    }

    /// Core leave logic shared by `on_leave` and `on_disconnect`.
    ///
    /// Outcome handling, under the session's lock:
    /// - active session, now empty: tear down; the loop task reclaims the id
    /// - waiting session, now empty: reclaim the id immediately
    /// - waiting session, others remain: refresh the room's lobby status
    /// - active session, others remain: tear down for everyone (a session
    ///   never continues short-handed)
    async fn leave_session(&self, participant: &ParticipantId) -> LeaveOutcome {
        let Some(session) = self.registry.session_for(participant) else {
            return LeaveOutcome::NotJoined;
        };
        let id = session.id();

        let mut state = session.lock().await;
        // The loop task may have reclaimed the session while we waited for
        // its lock; the binding is gone in that case and there is nothing
        // left to leave.
        if self.registry.session_id_for(participant) != Some(id) {
            return LeaveOutcome::NotJoined;
        }
        self.sink.leave_room(id, participant);
        self.registry.unbind(participant);
        state.remove_participant(participant);
        self.registry.barrier().remove_participant(id, participant);

        let was_active = self.registry.is_active(id);
        let now_empty = state.human_count() == 0;
        log::info!(
            "{participant} left session {id} (active: {was_active}, empty: {now_empty})"
        );

        match (was_active, now_empty) {
            (true, _) => {
                state.tear_down();
                LeaveOutcome::EndedActiveGame
            }
            (false, true) => {
                self.registry.cleanup(id);
                LeaveOutcome::DissolvedLobby
            }
            (false, false) => {
                let status = self.waiting_status(id, &state);
                self.sink.broadcast(id, &status);
                LeaveOutcome::LeftLobby
            }
        }
    }

    fn waiting_status(&self, id: SessionId, state: &SessionState) -> ServerEvent {
        ServerEvent::WaitingRoomStatus {
            human_count: state.human_count(),
            needed: state.available_slots().len(),
            ms_remaining: self.registry.waitroom_ms_remaining(id),
        }
    }

    fn connection_lock(&self, participant: &ParticipantId) -> Option<Arc<AsyncMutex<()>>> {
        self.connections.lock().get(participant).map(Arc::clone)
    }
}
