//! Room configuration
//!
//! One [`RoomConfig`] is shared by every session the server creates. It
//! serializes to JSON so it can ride along in `session_started` and
//! `reset_pending` payloads.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Action, SlotId};

// ============================================================================
// Room Configuration
// ============================================================================

/// How a session seat is controlled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum SlotPolicySpec {
    /// Seat filled by a connecting human participant
    Human,
    /// Seat driven by uniform random sampling from the action space
    Random,
    /// Seat driven by a named policy resolved through the policy loader
    Model(String),
}

/// What an autonomous slot does on ticks where frame skip suppresses
/// recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSkipPolicy {
    /// Repeat the most recently computed action
    #[default]
    RepeatLast,
    /// Substitute the configured default action
    UseDefault,
}

/// Main configuration for the session core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Size of the session id pool; joins beyond this are refused
    pub max_concurrent_sessions: usize,
    /// Simulation rate for active sessions, in ticks per second
    pub fps: u32,
    /// Episodes to run before a session completes
    pub num_episodes: u32,
    /// Autonomous slots recompute their action every this many ticks
    pub frame_skip: u32,
    /// Behavior of autonomous slots on skipped ticks
    pub frame_skip_policy: FrameSkipPolicy,
    /// Action applied for a human slot with nothing queued
    pub default_action: Action,
    /// Client input name to action translation table
    pub action_mapping: HashMap<String, Action>,
    /// Seat layout shared by every session
    pub slot_policies: BTreeMap<SlotId, SlotPolicySpec>,
    /// Waiting-room budget reported to lobby clients
    pub waitroom_timeout_ms: u64,
    /// How long to wait on reset acknowledgments before resuming anyway
    pub reset_timeout_ms: u64,
    /// Where clients should navigate when the session ends
    pub redirect_url: Option<String>,
    /// Grace period before the end-of-session redirect
    pub redirect_timeout_ms: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 10,
            fps: 30,
            num_episodes: 1,
            frame_skip: 1,
            frame_skip_policy: FrameSkipPolicy::default(),
            default_action: Action::new(0),
            action_mapping: HashMap::new(),
            slot_policies: BTreeMap::new(),
            waitroom_timeout_ms: 120_000,
            reset_timeout_ms: 5_000,
            redirect_url: None,
            redirect_timeout_ms: 5_000,
        }
    }
}

impl RoomConfig {
    /// Create a new builder for `RoomConfig`
    #[must_use]
    pub fn builder() -> RoomConfigBuilder {
        RoomConfigBuilder::default()
    }

    /// Duration of one tick at the configured rate
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }

    /// Translate a client input name into a configured action
    #[must_use]
    pub fn action_for_input(&self, input: &str) -> Option<Action> {
        self.action_mapping.get(input).copied()
    }

    /// Serialize the configuration for event payloads
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ============================================================================
// Builder for RoomConfig
// ============================================================================

/// Builder for [`RoomConfig`]
#[derive(Debug, Default)]
pub struct RoomConfigBuilder {
    config: RoomConfig,
}

impl RoomConfigBuilder {
    /// Set the session id pool size
    #[must_use]
    pub fn max_concurrent_sessions(mut self, max: usize) -> Self {
        self.config.max_concurrent_sessions = max;
        self
    }

    /// Set the simulation rate in ticks per second
    #[must_use]
    pub fn fps(mut self, fps: u32) -> Self {
        self.config.fps = fps;
        self
    }

    /// Set the episode budget
    #[must_use]
    pub fn num_episodes(mut self, episodes: u32) -> Self {
        self.config.num_episodes = episodes;
        self
    }

    /// Set the autonomous recompute interval in ticks
    #[must_use]
    pub fn frame_skip(mut self, ticks: u32) -> Self {
        self.config.frame_skip = ticks;
        self
    }

    /// Set the skipped-tick behavior for autonomous slots
    #[must_use]
    pub fn frame_skip_policy(mut self, policy: FrameSkipPolicy) -> Self {
        self.config.frame_skip_policy = policy;
        self
    }

    /// Set the action substituted for idle human slots
    #[must_use]
    pub fn default_action(mut self, action: Action) -> Self {
        self.config.default_action = action;
        self
    }

    /// Map a client input name to an action
    #[must_use]
    pub fn map_input(mut self, input: impl Into<String>, action: Action) -> Self {
        self.config.action_mapping.insert(input.into(), action);
        self
    }

    /// Add a seat to the session layout
    #[must_use]
    pub fn slot(mut self, slot: impl Into<SlotId>, policy: SlotPolicySpec) -> Self {
        self.config.slot_policies.insert(slot.into(), policy);
        self
    }

    /// Set the waiting-room budget in milliseconds
    #[must_use]
    pub fn waitroom_timeout_ms(mut self, ms: u64) -> Self {
        self.config.waitroom_timeout_ms = ms;
        self
    }

    /// Set the reset-acknowledgment timeout in milliseconds
    #[must_use]
    pub fn reset_timeout_ms(mut self, ms: u64) -> Self {
        self.config.reset_timeout_ms = ms;
        self
    }

    /// Set the end-of-session redirect target
    #[must_use]
    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.config.redirect_url = Some(url.into());
        self
    }

    /// Set the grace period before the end-of-session redirect
    #[must_use]
    pub fn redirect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.redirect_timeout_ms = ms;
        self
    }

    /// Build the final `RoomConfig`
    #[must_use]
    pub fn build(self) -> RoomConfig {
        self.config
    }
}
