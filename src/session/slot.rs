//! Seat occupancy and autonomous-slot driving

use crate::config::{FrameSkipPolicy, RoomConfig};
use crate::env::{Environment, Observation, Policy};
use crate::types::{Action, ParticipantId, SlotId};

/// What currently occupies a seat.
///
/// Human seats cycle `Open ↔ Human`; autonomous seats are bound at session
/// construction and never open up.
pub enum SlotOccupant {
    /// Human seat with nobody in it
    Open,
    /// Human seat occupied by a connected participant
    Human(ParticipantId),
    /// Seat permanently driven by a policy
    Autonomous(AgentDriver),
}

impl SlotOccupant {
    /// Whether this seat can accept a joining human.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// The occupying participant, for human-occupied seats.
    #[must_use]
    pub fn participant(&self) -> Option<&ParticipantId> {
        match self {
            Self::Human(id) => Some(id),
            _ => None,
        }
    }
}

impl std::fmt::Debug for SlotOccupant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => f.write_str("Open"),
            Self::Human(id) => f.debug_tuple("Human").field(id).finish(),
            Self::Autonomous(driver) => f.debug_tuple("Autonomous").field(driver).finish(),
        }
    }
}

/// Policy binding for an autonomous seat.
pub enum AutonomousPolicy {
    /// Uniform sampling from the environment's action space
    Random,
    /// A loaded model
    Model(Box<dyn Policy>),
}

/// Drives one autonomous seat, tracking the last computed action so frame
/// skip can repeat it.
pub struct AgentDriver {
    policy: AutonomousPolicy,
    last_action: Option<Action>,
}

impl AgentDriver {
    /// Driver sampling randomly from the action space
    #[must_use]
    pub fn random() -> Self {
        Self {
            policy: AutonomousPolicy::Random,
            last_action: None,
        }
    }

    /// Driver backed by a loaded model
    #[must_use]
    pub fn model(policy: Box<dyn Policy>) -> Self {
        Self {
            policy: AutonomousPolicy::Model(policy),
            last_action: None,
        }
    }

    /// Action for the given tick.
    ///
    /// Recomputes every `frame_skip` ticks (tick 0 included); on skipped
    /// ticks the configured [`FrameSkipPolicy`] applies. A skipped tick
    /// before any computation falls back to the default action.
    pub fn next_action(
        &mut self,
        slot: &SlotId,
        observation: &Observation,
        tick: u64,
        env: &mut dyn Environment,
        config: &RoomConfig,
    ) -> Action {
        let interval = u64::from(config.frame_skip.max(1));
        if tick % interval == 0 {
            let action = match &mut self.policy {
                AutonomousPolicy::Random => env.action_space_sample(),
                AutonomousPolicy::Model(policy) => policy.infer(slot, observation),
            };
            self.last_action = Some(action);
            return action;
        }

        match config.frame_skip_policy {
            FrameSkipPolicy::RepeatLast => self.last_action.unwrap_or(config.default_action),
            FrameSkipPolicy::UseDefault => config.default_action,
        }
    }

    /// Forget the last computed action (episode boundary).
    pub fn reset(&mut self) {
        self.last_action = None;
    }
}

impl std::fmt::Debug for AgentDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.policy {
            AutonomousPolicy::Random => "random",
            AutonomousPolicy::Model(_) => "model",
        };
        f.debug_struct("AgentDriver")
            .field("policy", &kind)
            .field("last_action", &self.last_action)
            .finish()
    }
}
