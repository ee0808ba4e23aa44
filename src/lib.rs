//! # simroom
//!
//! Session server core for ticking, multi-participant simulations. It
//! multiplexes many concurrent clients onto a bounded pool of game rooms:
//! matching waiting clients into sessions, driving a fixed-rate simulation
//! loop per active session, mixing human-submitted and policy-computed
//! actions, and surviving mid-session disconnects, multi-episode
//! continuation, and id reclamation.
//!
//! The simulation itself, rendering, and the websocket layer are the
//! host's business: the host supplies an [`Environment`] factory, optional
//! [`Policy`] implementations for autonomous seats, and an [`EventSink`]
//! backed by its transport. Everything else (matchmaking, lifecycle,
//! episode boundaries, capacity) lives here.
//!
//! ## Wiring
//!
//! ```no_run
//! use simroom::{Action, RoomConfig, SlotPolicySpec};
//!
//! let config = RoomConfig::builder()
//!     .max_concurrent_sessions(8)
//!     .fps(15)
//!     .num_episodes(3)
//!     .slot("agent-0", SlotPolicySpec::Human)
//!     .slot("agent-1", SlotPolicySpec::Random)
//!     .map_input("ArrowLeft", Action::new(0))
//!     .map_input("ArrowRight", Action::new(1))
//!     .default_action(Action::new(2))
//!     .build();
//! ```
//!
//! The host then constructs one [`Registry`] (passing the config, an
//! environment factory, a policy loader, and its sink) and one
//! [`Coordinator`] over it, and forwards each client event (connect,
//! join, leave, submitted inputs, reset acknowledgments, disconnect) to
//! the matching `Coordinator` handler. Game loop tasks are spawned
//! internally when a session fills.
//!
//! ## Concurrency model
//!
//! Many lightweight tokio tasks: the host's per-connection handlers plus
//! one loop task per active session. Correctness comes from explicit
//! locking, not from a single serializing event loop:
//!
//! - per-connection lock - serializes one client's join/leave transitions
//! - per-session lock - guards all slot/status/queue mutation and each tick
//! - one registry mutex - guards the id pool, waiting list, and connection
//!   map; never held across an await
//!
//! A session lock may be held while taking the registry lock, never the
//! reverse, and no task ever holds two sessions' locks at once.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod barrier;
pub mod config;
pub mod coordinator;
pub mod env;
pub mod error;
pub mod events;
mod game_loop;
pub mod registry;
pub mod session;
pub mod types;

// Re-export commonly used types for external API
pub use barrier::ResetBarrier;
pub use config::{FrameSkipPolicy, RoomConfig, RoomConfigBuilder, SlotPolicySpec};
pub use coordinator::{Coordinator, LeaveOutcome};
pub use env::{
    EnvFactory, Environment, Observation, Policy, PolicyLoader, RenderedState, StepOutcome,
};
pub use error::{Result, RoomError};
pub use events::{EventSink, ServerEvent};
pub use registry::Registry;
pub use session::{Session, SessionState, SessionStatus};
pub use types::{Action, ParticipantId, SessionId, SlotId};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
