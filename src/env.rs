//! Environment and policy abstractions
//!
//! The session core never inspects simulation state; it drives whatever
//! implements [`Environment`] and consults [`Policy`] implementations for
//! autonomously-controlled slots. Hosts supply factories so every session
//! owns a private environment instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Action, SlotId};

/// Opaque observation produced by the environment and consumed by policies.
pub type Observation = serde_json::Value;

/// Result of stepping the environment once with a full action set.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Observation after the step
    pub observation: Observation,
    /// Per-slot reward for this step
    pub rewards: BTreeMap<SlotId, f64>,
    /// Whether the episode reached a terminal state
    pub terminated: bool,
    /// Whether the episode was cut off (time limit or similar)
    pub truncated: bool,
    /// Auxiliary diagnostic payload, passed through untouched
    pub info: serde_json::Value,
}

/// Client-displayable snapshot of the environment.
///
/// Either a structured state object the client renders itself, or an
/// already-encoded frame, depending on how the host renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedState {
    /// Structured scene description, if the host renders client-side
    pub state: Option<serde_json::Value>,
    /// Base64-encoded frame, if the host renders server-side
    pub frame_base64: Option<String>,
}

/// A steppable, resettable simulation instance owned by one session.
pub trait Environment: Send {
    /// Reset to the start of an episode, returning the initial observation.
    fn reset(&mut self, seed: Option<u64>) -> Result<Observation>;

    /// Advance one step with an action for every slot.
    fn step(&mut self, actions: &BTreeMap<SlotId, Action>) -> Result<StepOutcome>;

    /// Sample a uniformly random valid action.
    fn action_space_sample(&mut self) -> Action;

    /// Produce a client-displayable snapshot of the current state.
    fn render(&self) -> RenderedState;
}

/// Action source for an autonomous slot backed by a trained model.
pub trait Policy: Send {
    /// Compute an action for `slot` from the latest observation.
    fn infer(&mut self, slot: &SlotId, observation: &Observation) -> Action;
}

/// Factory constructing a fresh environment per session.
pub type EnvFactory = Arc<dyn Fn() -> Box<dyn Environment> + Send + Sync>;

/// Loader resolving a configured policy name to a policy instance.
pub type PolicyLoader = Arc<dyn Fn(&str) -> Result<Box<dyn Policy>> + Send + Sync>;
