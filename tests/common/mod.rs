//! Shared test doubles
//!
//! A recording event sink standing in for the transport layer, plus a
//! scripted environment and counting policy for driving sessions without
//! a real simulation.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::json;

use simroom::{
    Action, EnvFactory, Environment, EventSink, Observation, ParticipantId, Policy, PolicyLoader,
    RenderedState, Result, RoomError, ServerEvent, SessionId, SlotId, StepOutcome,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Recording event sink
// ============================================================================

/// In-memory transport double: tracks room membership like a real
/// broadcast layer and records every delivery per participant.
pub struct RecordingSink {
    state: Mutex<SinkState>,
}

#[derive(Default)]
struct SinkState {
    rooms: HashMap<SessionId, HashSet<ParticipantId>>,
    deliveries: Vec<(ParticipantId, ServerEvent)>,
    room_log: Vec<(SessionId, ServerEvent)>,
    closed: Vec<SessionId>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SinkState::default()),
        })
    }

    /// Every event delivered to this participant, in order.
    pub fn events_for(&self, participant: &ParticipantId) -> Vec<ServerEvent> {
        self.state
            .lock()
            .deliveries
            .iter()
            .filter(|(target, _)| target == participant)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Every event broadcast to this room, in order.
    pub fn room_events(&self, session: SessionId) -> Vec<ServerEvent> {
        self.state
            .lock()
            .room_log
            .iter()
            .filter(|(target, _)| *target == session)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn closed_rooms(&self) -> Vec<SessionId> {
        self.state.lock().closed.clone()
    }

    pub fn member_count(&self, session: SessionId) -> usize {
        self.state
            .lock()
            .rooms
            .get(&session)
            .map_or(0, HashSet::len)
    }
}

impl EventSink for RecordingSink {
    fn send_to(&self, participant: &ParticipantId, event: &ServerEvent) {
        self.state
            .lock()
            .deliveries
            .push((participant.clone(), event.clone()));
    }

    fn broadcast(&self, session: SessionId, event: &ServerEvent) {
        let mut state = self.state.lock();
        state.room_log.push((session, event.clone()));
        let members: Vec<ParticipantId> = state
            .rooms
            .get(&session)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        for member in members {
            state.deliveries.push((member, event.clone()));
        }
    }

    fn join_room(&self, session: SessionId, participant: &ParticipantId) {
        self.state
            .lock()
            .rooms
            .entry(session)
            .or_default()
            .insert(participant.clone());
    }

    fn leave_room(&self, session: SessionId, participant: &ParticipantId) {
        if let Some(members) = self.state.lock().rooms.get_mut(&session) {
            members.remove(participant);
        }
    }

    fn close_room(&self, session: SessionId) {
        let mut state = self.state.lock();
        state.rooms.remove(&session);
        state.closed.push(session);
    }
}

// ============================================================================
// Scripted environment
// ============================================================================

pub type ActionLog = Arc<Mutex<Vec<BTreeMap<SlotId, Action>>>>;

/// Deterministic environment that terminates every episode after a fixed
/// number of steps and records the action set it was stepped with.
pub struct ScriptedEnv {
    steps_per_episode: u64,
    step_in_episode: u64,
    actions: ActionLog,
    resets: Arc<AtomicU32>,
    fail_on_reset: bool,
}

impl ScriptedEnv {
    pub fn new(steps_per_episode: u64) -> Self {
        Self {
            steps_per_episode,
            step_in_episode: 0,
            actions: Arc::new(Mutex::new(Vec::new())),
            resets: Arc::new(AtomicU32::new(0)),
            fail_on_reset: false,
        }
    }

    pub fn with_shared(
        steps_per_episode: u64,
        actions: ActionLog,
        resets: Arc<AtomicU32>,
    ) -> Self {
        Self {
            steps_per_episode,
            step_in_episode: 0,
            actions,
            resets,
            fail_on_reset: false,
        }
    }

    pub fn failing_on_reset() -> Self {
        Self {
            fail_on_reset: true,
            ..Self::new(1)
        }
    }

    pub fn action_log(&self) -> ActionLog {
        Arc::clone(&self.actions)
    }
}

impl Environment for ScriptedEnv {
    fn reset(&mut self, _seed: Option<u64>) -> Result<Observation> {
        if self.fail_on_reset {
            return Err(RoomError::environment("scripted reset failure"));
        }
        self.step_in_episode = 0;
        let episode = self.resets.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "episode": episode }))
    }

    fn step(&mut self, actions: &BTreeMap<SlotId, Action>) -> Result<StepOutcome> {
        self.actions.lock().push(actions.clone());
        self.step_in_episode += 1;
        Ok(StepOutcome {
            observation: json!({ "step": self.step_in_episode }),
            rewards: actions.keys().map(|slot| (slot.clone(), 0.0)).collect(),
            terminated: self.step_in_episode >= self.steps_per_episode,
            truncated: false,
            info: json!({}),
        })
    }

    fn action_space_sample(&mut self) -> Action {
        Action::new(99)
    }

    fn render(&self) -> RenderedState {
        RenderedState {
            state: Some(json!({ "step": self.step_in_episode })),
            frame_base64: None,
        }
    }
}

/// Factory handing every session its own scripted environment while all
/// instances share one action log and reset counter.
pub fn scripted_factory(steps_per_episode: u64) -> (EnvFactory, ActionLog, Arc<AtomicU32>) {
    let actions: ActionLog = Arc::new(Mutex::new(Vec::new()));
    let resets = Arc::new(AtomicU32::new(0));
    let factory: EnvFactory = {
        let actions = Arc::clone(&actions);
        let resets = Arc::clone(&resets);
        Arc::new(move || {
            Box::new(ScriptedEnv::with_shared(
                steps_per_episode,
                Arc::clone(&actions),
                Arc::clone(&resets),
            ))
        })
    };
    (factory, actions, resets)
}

// ============================================================================
// Policies
// ============================================================================

/// Policy returning a fixed action and counting its invocations.
pub struct CountingPolicy {
    action: Action,
    calls: Arc<AtomicUsize>,
}

impl CountingPolicy {
    pub fn new(action: Action, calls: Arc<AtomicUsize>) -> Self {
        Self { action, calls }
    }
}

impl Policy for CountingPolicy {
    fn infer(&mut self, _slot: &SlotId, _observation: &Observation) -> Action {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.action
    }
}

/// Loader resolving every name to a [`CountingPolicy`].
pub fn counting_policy_loader(action: Action, calls: Arc<AtomicUsize>) -> PolicyLoader {
    Arc::new(move |_name| Ok(Box::new(CountingPolicy::new(action, Arc::clone(&calls))) as Box<dyn Policy>))
}

/// Loader that knows no policies at all.
pub fn no_policy_loader() -> PolicyLoader {
    Arc::new(|name| Err(RoomError::unknown_policy(name)))
}
