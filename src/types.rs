//! Newtype wrappers for type safety
//!
//! Wraps the primitive values that flow through the session core (pool
//! indices, seat names, connection identities, action encodings) into
//! distinct types so they cannot be mixed up at call sites.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Newtype Wrappers for Type Safety
// ============================================================================

/// Session identifier drawn from the registry's bounded pool.
///
/// Unique among live sessions at all times; reused only after full cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u32);

impl SessionId {
    /// Create a session ID from a pool index
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw pool index
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical seat name inside a session (e.g. `"agent-0"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    /// Create a new slot ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the slot ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SlotId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SlotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-connection identity token.
///
/// Assigned by the transport layer and assumed valid; the core only ever
/// compares and maps these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a participant ID from an existing token
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identity token (UUID v4)
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the identity token as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discrete action value passed to the environment.
///
/// The core treats actions as opaque; a discrete encoding covers the
/// keyboard-driven clients this server fronts and keeps pending-action
/// queues `Copy`-cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(i64);

impl Action {
    /// Create an action from its discrete encoding
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the discrete encoding
    #[must_use]
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for Action {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
