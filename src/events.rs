//! Outbound events and the transport boundary
//!
//! The core is transport-agnostic: everything a client must hear goes
//! through [`EventSink`], which the host backs with its websocket (or
//! other) layer. Delivery is assumed at-least-once and per-connection
//! ordered, with a room/broadcast-group abstraction keyed by session id.

use serde::Serialize;

use crate::env::RenderedState;
use crate::types::{ParticipantId, SessionId};

/// Events emitted by the session core toward clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Lobby progress for a session still waiting on participants
    WaitingRoomStatus {
        /// Humans currently seated
        human_count: usize,
        /// Open seats remaining
        needed: usize,
        /// Remaining waiting-room budget, saturating at zero
        ms_remaining: u64,
    },

    /// The session filled and its loop is starting
    SessionStarted {
        /// Full serialized room configuration
        config: serde_json::Value,
    },

    /// The loop is about to tick; clients should submit pressed inputs
    InputRequest,

    /// Fresh state snapshot after a tick
    StateUpdate {
        /// Client-displayable snapshot
        rendered_state: RenderedState,
        /// Tick counter within the current episode
        tick: u64,
    },

    /// An episode ended and the session is waiting on reset acknowledgments
    ResetPending {
        /// How long the server will wait before resuming regardless
        timeout_ms: u64,
        /// Full serialized room configuration
        config: serde_json::Value,
    },

    /// The session is over (episode budget exhausted or torn down)
    SessionEnded {
        /// Where the client should navigate next, if anywhere
        redirect_url: Option<String>,
        /// Grace period before the redirect
        timeout_ms: u64,
    },

    /// The waiting room dissolved before the session started
    LobbyClosed,

    /// A join was refused because every session id is in use
    CapacityExceeded {
        /// Human-readable reason
        error: String,
    },
}

/// Transport-side delivery surface.
///
/// Implementations must be cheap and non-blocking: they are invoked while
/// session locks are held. Room membership is tracked by the sink so that
/// `broadcast` reaches exactly the participants currently in the room.
pub trait EventSink: Send + Sync {
    /// Deliver an event to a single participant.
    fn send_to(&self, participant: &ParticipantId, event: &ServerEvent);

    /// Deliver an event to every participant currently in the room.
    fn broadcast(&self, session: SessionId, event: &ServerEvent);

    /// Add a participant to a session's broadcast group.
    fn join_room(&self, session: SessionId, participant: &ParticipantId);

    /// Remove a participant from a session's broadcast group.
    fn leave_room(&self, session: SessionId, participant: &ParticipantId);

    /// Dissolve a session's broadcast group entirely.
    fn close_room(&self, session: SessionId);
}
