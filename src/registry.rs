//! Session registry: bounded id pool, matchmaking queue, connection map
//!
//! One registry per process, injected by reference into every handler.
//! All registry state lives behind a single mutex that is never held
//! across an await point; a session's lock may be held while taking the
//! registry lock, never the reverse.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::barrier::ResetBarrier;
use crate::config::{RoomConfig, SlotPolicySpec};
use crate::env::{EnvFactory, PolicyLoader};
use crate::error::{Result, RoomError};
use crate::events::EventSink;
use crate::session::{AgentDriver, Session, SlotOccupant};
use crate::types::{ParticipantId, SessionId, SlotId};

/// Process-wide session bookkeeping.
pub struct Registry {
    config: Arc<RoomConfig>,
    env_factory: EnvFactory,
    policy_loader: PolicyLoader,
    sink: Arc<dyn EventSink>,
    barrier: Arc<ResetBarrier>,
    state: Mutex<RegistryState>,
}

struct RegistryState {
    /// Unused session ids; `free_ids ∪ live session ids` is always the
    /// full `0..max_concurrent_sessions` range with no overlap.
    free_ids: VecDeque<SessionId>,
    /// Live sessions by id.
    sessions: HashMap<SessionId, Arc<Session>>,
    /// Sessions still accepting participants, oldest first.
    waiting: VecDeque<SessionId>,
    /// Sessions whose game loop is (being) spawned.
    active: HashSet<SessionId>,
    /// Joined participant to session binding.
    rooms: HashMap<ParticipantId, SessionId>,
    /// Waiting-room deadlines for `ms_remaining` reporting.
    waitroom_deadlines: HashMap<SessionId, Instant>,
}

impl Registry {
    /// Create a registry with a full id pool.
    pub fn new(
        config: Arc<RoomConfig>,
        env_factory: EnvFactory,
        policy_loader: PolicyLoader,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let free_ids = (0..config.max_concurrent_sessions as u32)
            .map(SessionId::new)
            .collect();
        Self {
            config,
            env_factory,
            policy_loader,
            sink,
            barrier: Arc::new(ResetBarrier::new()),
            state: Mutex::new(RegistryState {
                free_ids,
                sessions: HashMap::new(),
                waiting: VecDeque::new(),
                active: HashSet::new(),
                rooms: HashMap::new(),
                waitroom_deadlines: HashMap::new(),
            }),
        }
    }

    /// The shared room configuration.
    #[must_use]
    pub fn config(&self) -> &Arc<RoomConfig> {
        &self.config
    }

    /// The reset-acknowledgment barrier shared by all sessions.
    #[must_use]
    pub fn barrier(&self) -> &Arc<ResetBarrier> {
        &self.barrier
    }

    /// Create a new waiting session if an id is free.
    ///
    /// Never blocks: pool exhaustion is a `CapacityExceeded` error for the
    /// requesting client, not a wait.
    pub fn try_create(&self) -> Result<Arc<Session>> {
        let mut state = self.state.lock();
        let id = state
            .free_ids
            .pop_front()
            .ok_or_else(|| RoomError::capacity_exceeded(self.config.max_concurrent_sessions))?;

        match self.build_session(id) {
            Ok(session) => {
                state.sessions.insert(id, Arc::clone(&session));
                state.waiting.push_back(id);
                state.waitroom_deadlines.insert(
                    id,
                    Instant::now() + std::time::Duration::from_millis(self.config.waitroom_timeout_ms),
                );
                log::debug!("created session {id}, now waiting for participants");
                Ok(session)
            }
            Err(err) => {
                // Construction failed; the id goes straight back.
                state.free_ids.push_front(id);
                Err(err)
            }
        }
    }

    /// The oldest waiting session, or a freshly created one.
    pub fn find_or_create_waiting(&self) -> Result<Arc<Session>> {
        let existing = {
            let state = self.state.lock();
            state
                .waiting
                .front()
                .and_then(|id| state.sessions.get(id))
                .map(Arc::clone)
        };
        match existing {
            Some(session) => Ok(session),
            None => self.try_create(),
        }
    }

    /// Move a session that just filled from the waiting list to the active
    /// set. The caller spawns the game loop task.
    pub fn promote_to_active(&self, id: SessionId) {
        let mut state = self.state.lock();
        state.waiting.retain(|waiting| *waiting != id);
        state.waitroom_deadlines.remove(&id);
        state.active.insert(id);
        log::info!("session {id} is full, promoting to active");
    }

    /// Whether the session's game loop is (being) run.
    #[must_use]
    pub fn is_active(&self, id: SessionId) -> bool {
        self.state.lock().active.contains(&id)
    }

    /// Bind a joined participant to its session.
    pub fn bind(&self, participant: ParticipantId, id: SessionId) {
        self.state.lock().rooms.insert(participant, id);
    }

    /// Drop a participant's session binding.
    pub fn unbind(&self, participant: &ParticipantId) {
        self.state.lock().rooms.remove(participant);
    }

    /// The session a participant is joined to, if any.
    #[must_use]
    pub fn session_for(&self, participant: &ParticipantId) -> Option<Arc<Session>> {
        let state = self.state.lock();
        state
            .rooms
            .get(participant)
            .and_then(|id| state.sessions.get(id))
            .map(Arc::clone)
    }

    /// The session id a participant is joined to, if any.
    #[must_use]
    pub fn session_id_for(&self, participant: &ParticipantId) -> Option<SessionId> {
        self.state.lock().rooms.get(participant).copied()
    }

    /// Remaining waiting-room budget for a session, saturating at zero.
    #[must_use]
    pub fn waitroom_ms_remaining(&self, id: SessionId) -> u64 {
        self.state
            .lock()
            .waitroom_deadlines
            .get(&id)
            .map(|deadline| {
                deadline
                    .saturating_duration_since(Instant::now())
                    .as_millis() as u64
            })
            .unwrap_or(0)
    }

    /// Remove every trace of a session and release its id.
    ///
    /// # Panics
    ///
    /// Panics if the id is already free: a double release means the
    /// registry's pool invariant is broken, and continuing would let two
    /// live sessions share an id.
    pub fn cleanup(&self, id: SessionId) {
        let mut state = self.state.lock();
        assert!(
            !state.free_ids.contains(&id),
            "session id {id} released twice"
        );

        state.rooms.retain(|_, bound| *bound != id);
        state.waiting.retain(|waiting| *waiting != id);
        state.waitroom_deadlines.remove(&id);
        state.active.remove(&id);
        state.sessions.remove(&id);
        state.free_ids.push_back(id);
        drop(state);

        self.barrier.clear(id);
        self.sink.close_room(id);
        log::info!("session {id} cleaned up, id returned to pool");
    }

    /// Ids currently free, in allocation order.
    #[must_use]
    pub fn free_session_ids(&self) -> Vec<SessionId> {
        self.state.lock().free_ids.iter().copied().collect()
    }

    /// Ids of live (waiting or active) sessions.
    #[must_use]
    pub fn live_session_ids(&self) -> Vec<SessionId> {
        self.state.lock().sessions.keys().copied().collect()
    }

    /// Number of sessions still accepting participants.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiting.len()
    }

    fn build_session(&self, id: SessionId) -> Result<Arc<Session>> {
        let env = (self.env_factory)();
        let mut slots: BTreeMap<SlotId, SlotOccupant> = BTreeMap::new();
        for (slot, policy) in &self.config.slot_policies {
            let occupant = match policy {
                SlotPolicySpec::Human => SlotOccupant::Open,
                SlotPolicySpec::Random => SlotOccupant::Autonomous(AgentDriver::random()),
                SlotPolicySpec::Model(name) => {
                    SlotOccupant::Autonomous(AgentDriver::model((self.policy_loader)(name)?))
                }
            };
            slots.insert(slot.clone(), occupant);
        }
        Ok(Arc::new(Session::new(
            id,
            Arc::clone(&self.config),
            env,
            slots,
        )))
    }
}
