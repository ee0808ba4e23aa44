//! Error types for the session core

use thiserror::Error;

use crate::types::{ParticipantId, SlotId};

/// Main error type for session core operations
#[derive(Error, Debug)]
pub enum RoomError {
    /// No free session id in the bounded pool
    #[error("server at maximum session capacity ({0})")]
    CapacityExceeded(usize),

    /// A join targeted a slot that is not open
    #[error("slot {0} is not available")]
    SlotUnavailable(SlotId),

    /// A participant was not found in the session it was expected in
    #[error("participant {0} not found in session")]
    ParticipantNotFound(ParticipantId),

    /// The environment failed to step or reset
    #[error("environment failure: {0}")]
    Environment(String),

    /// A slot was configured with a policy name the loader does not know
    #[error("no policy registered under name '{0}'")]
    UnknownPolicy(String),
}

/// Result type alias for session core operations
pub type Result<T> = std::result::Result<T, RoomError>;

impl RoomError {
    /// Create a capacity-exceeded error
    #[must_use]
    pub fn capacity_exceeded(max: usize) -> Self {
        Self::CapacityExceeded(max)
    }

    /// Create a slot-unavailable error
    pub fn slot_unavailable(slot: impl Into<SlotId>) -> Self {
        Self::SlotUnavailable(slot.into())
    }

    /// Create a participant-not-found error
    pub fn participant_not_found(participant: impl Into<ParticipantId>) -> Self {
        Self::ParticipantNotFound(participant.into())
    }

    /// Create an environment failure error
    pub fn environment(msg: impl Into<String>) -> Self {
        Self::Environment(msg.into())
    }

    /// Create an unknown-policy error
    pub fn unknown_policy(name: impl Into<String>) -> Self {
        Self::UnknownPolicy(name.into())
    }
}
