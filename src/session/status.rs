//! Session lifecycle states

use serde::{Deserialize, Serialize};

/// Lifecycle state of a session.
///
/// Transitions:
/// - `Inactive → Active` on the first successful reset
/// - `Active → Reset` when an episode ends with episodes remaining
/// - `Active → Done` when the episode budget is exhausted
/// - `Reset → Active` on the episode-boundary reset
/// - any state `→ Inactive` on teardown (idempotent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but not started, or torn down
    Inactive,
    /// Ticking
    Active,
    /// Between episodes, waiting on reset acknowledgments
    Reset,
    /// Episode budget exhausted
    Done,
}

impl SessionStatus {
    /// States that end a session's game loop.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Inactive | Self::Done)
    }

    /// Whether moving to `next` is a legal lifecycle transition.
    #[must_use]
    pub fn can_transition(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Inactive, Self::Active)
                | (Self::Active, Self::Reset)
                | (Self::Active, Self::Done)
                | (Self::Reset, Self::Active)
                | (_, Self::Inactive)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Reset => "reset",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}
