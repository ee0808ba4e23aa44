//! Episode-boundary synchronization
//!
//! Between episodes a session waits until every participant connected at
//! the start of the reset cycle has acknowledged. The pending set is a
//! snapshot taken at cycle start: participants joining afterwards owe no
//! acknowledgment, and participants leaving mid-cycle are removed at
//! leave-time so their absence can never wedge the barrier.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::types::{ParticipantId, SessionId};

/// Reset-acknowledgment gate shared by every session.
#[derive(Default)]
pub struct ResetBarrier {
    /// Outstanding acknowledgments per session's current cycle.
    pending: Mutex<HashMap<SessionId, HashSet<ParticipantId>>>,
    /// Wakes waiters whenever any pending set shrinks. Waiters re-check
    /// their own session's set, so cross-session wakeups are harmless.
    notify: Notify,
}

impl ResetBarrier {
    /// Create a barrier with no cycles in progress
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a reset cycle, snapshotting who must acknowledge.
    pub fn begin_cycle(
        &self,
        session: SessionId,
        participants: impl IntoIterator<Item = ParticipantId>,
    ) {
        let snapshot: HashSet<ParticipantId> = participants.into_iter().collect();
        log::debug!(
            "session {session}: reset cycle begins, awaiting {} acknowledgment(s)",
            snapshot.len()
        );
        self.pending.lock().insert(session, snapshot);
        // An empty room acknowledges trivially.
        self.notify.notify_waiters();
    }

    /// Record a participant's acknowledgment for the current cycle.
    ///
    /// Acks from identities outside the cycle's snapshot (late joiners,
    /// duplicates) are ignored.
    pub fn acknowledge(&self, session: SessionId, participant: &ParticipantId) {
        let removed = self
            .pending
            .lock()
            .get_mut(&session)
            .is_some_and(|set| set.remove(participant));
        if removed {
            log::debug!("session {session}: {participant} acknowledged reset");
            self.notify.notify_waiters();
        }
    }

    /// Drop a leaving participant from the current cycle, if one is running.
    pub fn remove_participant(&self, session: SessionId, participant: &ParticipantId) {
        let removed = self
            .pending
            .lock()
            .get_mut(&session)
            .is_some_and(|set| set.remove(participant));
        if removed {
            log::debug!("session {session}: {participant} left mid-reset, no longer awaited");
            self.notify.notify_waiters();
        }
    }

    /// Whether every awaited participant has acknowledged (or left).
    #[must_use]
    pub fn all_acknowledged(&self, session: SessionId) -> bool {
        self.pending
            .lock()
            .get(&session)
            .is_none_or(HashSet::is_empty)
    }

    /// Suspend until the session's pending set drains.
    pub async fn wait_all(&self, session: SessionId) {
        loop {
            // Arm the waiter before checking so a wakeup between the check
            // and the await is not lost.
            let notified = self.notify.notified();
            if self.all_acknowledged(session) {
                return;
            }
            notified.await;
        }
    }

    /// End the session's cycle, discarding any outstanding flags.
    pub fn clear(&self, session: SessionId) {
        self.pending.lock().remove(&session);
    }
}
