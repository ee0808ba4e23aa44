//! Pending-action buffering
//!
//! One capacity-1 queue per seated participant. A slow client can never
//! stall the simulation: enqueueing overwrites, dequeueing never waits.

use crate::types::Action;

/// Single-slot buffer holding the most recent pending action.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionQueue {
    pending: Option<Action>,
}

impl ActionQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer an action, replacing anything already pending (most-recent-wins)
    pub fn put(&mut self, action: Action) {
        self.pending = Some(action);
    }

    /// Take the pending action, leaving the queue empty
    pub fn take(&mut self) -> Option<Action> {
        self.pending.take()
    }

    /// Discard anything pending
    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}
