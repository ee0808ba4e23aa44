//! Session rooms
//!
//! # Module Structure
//!
//! - `core` - `Session` / `SessionState` with the tick and lifecycle operations
//! - `status` - lifecycle state machine
//! - `slot` - seat occupancy sum type and autonomous-slot driving
//! - `queue` - capacity-1 pending-action buffers

mod core;
mod queue;
mod slot;
mod status;

pub use core::{Session, SessionState};
pub use queue::ActionQueue;
pub use slot::{AgentDriver, AutonomousPolicy, SlotOccupant};
pub use status::SessionStatus;
