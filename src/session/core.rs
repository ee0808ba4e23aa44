//! Session state and operations
//!
//! A [`Session`] is one game room: an environment instance, a fixed seat
//! layout, per-participant pending actions, and lifecycle counters. All
//! mutation happens through the session's exclusive lock; the game loop
//! task and connection handlers serialize on it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::seq::IteratorRandom;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::RoomConfig;
use crate::env::{Environment, Observation, RenderedState};
use crate::error::{Result, RoomError};
use crate::types::{Action, ParticipantId, SessionId, SlotId};

use super::queue::ActionQueue;
use super::slot::SlotOccupant;
use super::status::SessionStatus;

/// One simulation room with an exclusive lock over its state.
pub struct Session {
    id: SessionId,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Session {
    /// Construct a session with its seat layout and a private environment.
    pub fn new(
        id: SessionId,
        config: Arc<RoomConfig>,
        env: Box<dyn Environment>,
        slots: BTreeMap<SlotId, SlotOccupant>,
    ) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState {
                config,
                env,
                status: SessionStatus::Inactive,
                slots,
                queues: HashMap::new(),
                observation: Observation::Null,
                tick: 0,
                episode: 0,
            }),
        }
    }

    /// This session's pool id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Acquire the session's exclusive lock.
    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }
}

/// Mutable session state, reachable only through [`Session::lock`].
pub struct SessionState {
    config: Arc<RoomConfig>,
    env: Box<dyn Environment>,
    status: SessionStatus,
    slots: BTreeMap<SlotId, SlotOccupant>,
    queues: HashMap<ParticipantId, ActionQueue>,
    observation: Observation,
    tick: u64,
    episode: u32,
}

impl SessionState {
    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Tick counter within the current episode.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// 1-based index of the running episode; 0 before the first reset.
    #[must_use]
    pub fn episode(&self) -> u32 {
        self.episode
    }

    /// Seats a human could still take.
    #[must_use]
    pub fn available_slots(&self) -> Vec<SlotId> {
        self.slots
            .iter()
            .filter(|(_, occupant)| occupant.is_open())
            .map(|(slot, _)| slot.clone())
            .collect()
    }

    /// Whether every human seat is taken.
    #[must_use]
    pub fn is_full(&self) -> bool {
        !self.slots.values().any(SlotOccupant::is_open)
    }

    /// Number of seats currently occupied by humans.
    #[must_use]
    pub fn human_count(&self) -> usize {
        self.slots
            .values()
            .filter(|occupant| occupant.participant().is_some())
            .count()
    }

    /// Identities of every seated human.
    #[must_use]
    pub fn human_participants(&self) -> Vec<ParticipantId> {
        self.slots
            .values()
            .filter_map(|occupant| occupant.participant().cloned())
            .collect()
    }

    /// The seat a participant occupies, if any.
    #[must_use]
    pub fn slot_of(&self, participant: &ParticipantId) -> Option<&SlotId> {
        self.slots
            .iter()
            .find(|(_, occupant)| occupant.participant() == Some(participant))
            .map(|(slot, _)| slot)
    }

    /// Pick uniformly among the open seats.
    #[must_use]
    pub fn random_open_slot(&self) -> Option<SlotId> {
        self.slots
            .iter()
            .filter(|(_, occupant)| occupant.is_open())
            .map(|(slot, _)| slot.clone())
            .choose(&mut rand::thread_rng())
    }

    /// Seat a participant in an open slot.
    pub fn add_participant(&mut self, slot: &SlotId, participant: ParticipantId) -> Result<()> {
        match self.slots.get_mut(slot) {
            Some(occupant) if occupant.is_open() => {
                *occupant = SlotOccupant::Human(participant);
                Ok(())
            }
            _ => Err(RoomError::SlotUnavailable(slot.clone())),
        }
    }

    /// Unseat a participant.
    ///
    /// A duplicate leave (participant not seated) is logged and ignored;
    /// connection churn must never take the server down.
    pub fn remove_participant(&mut self, participant: &ParticipantId) {
        let slot = self
            .slots
            .iter()
            .find(|(_, occupant)| occupant.participant() == Some(participant))
            .map(|(slot, _)| slot.clone());

        let Some(slot) = slot else {
            log::warn!("attempted to remove {participant} but no seat holds them");
            return;
        };

        self.slots.insert(slot, SlotOccupant::Open);
        self.queues.remove(participant);
    }

    /// Buffer an action for a seated participant (most-recent-wins).
    ///
    /// Ignored unless the session is active and the identity holds a seat,
    /// which shields the simulation from stale or late client events.
    pub fn enqueue_action(&mut self, participant: &ParticipantId, action: Action) {
        if self.status != SessionStatus::Active {
            return;
        }
        if self.slot_of(participant).is_none() {
            return;
        }
        self.queues.entry(participant.clone()).or_default().put(action);
    }

    /// Advance the simulation one step.
    ///
    /// Human seats consume their pending action or fall back to the default;
    /// autonomous seats consult their driver. Episode termination moves the
    /// session to `Reset` while episodes remain, `Done` once the budget is
    /// spent.
    pub fn tick(&mut self) -> Result<()> {
        debug_assert_eq!(self.status, SessionStatus::Active);

        let actions: BTreeMap<SlotId, Action> = {
            let SessionState {
                env,
                slots,
                queues,
                config,
                observation,
                tick,
                ..
            } = self;

            slots
                .iter_mut()
                .map(|(slot, occupant)| {
                    let action = match occupant {
                        SlotOccupant::Open => config.default_action,
                        SlotOccupant::Human(participant) => queues
                            .get_mut(participant)
                            .and_then(ActionQueue::take)
                            .unwrap_or(config.default_action),
                        SlotOccupant::Autonomous(driver) => {
                            driver.next_action(slot, observation, *tick, env.as_mut(), config)
                        }
                    };
                    (slot.clone(), action)
                })
                .collect()
        };

        let outcome = self.env.step(&actions)?;
        self.observation = outcome.observation;
        self.tick += 1;

        if outcome.terminated || outcome.truncated {
            if self.episode < self.config.num_episodes {
                self.set_status(SessionStatus::Reset);
            } else {
                self.set_status(SessionStatus::Done);
            }
        }

        Ok(())
    }

    /// Start the next episode: clear pending actions, reset the environment,
    /// zero the tick counter, bump the episode counter.
    pub fn reset(&mut self, seed: Option<u64>) -> Result<()> {
        self.queues.clear();
        for occupant in self.slots.values_mut() {
            if let SlotOccupant::Autonomous(driver) = occupant {
                driver.reset();
            }
        }
        self.observation = self.env.reset(seed)?;
        self.set_status(SessionStatus::Active);
        self.tick = 0;
        self.episode += 1;
        Ok(())
    }

    /// Stop the session, discarding anything in flight. Idempotent.
    pub fn tear_down(&mut self) {
        self.set_status(SessionStatus::Inactive);
        self.queues.clear();
        self.observation = Observation::Null;
    }

    /// Client-displayable snapshot of the environment.
    #[must_use]
    pub fn render(&self) -> RenderedState {
        self.env.render()
    }

    fn set_status(&mut self, next: SessionStatus) {
        debug_assert!(
            self.status.can_transition(next),
            "illegal session transition {} -> {}",
            self.status,
            next
        );
        self.status = next;
    }
}
