//! Event payloads for each topic.

use battle_core::{EngineState, Frame, IntentExecResult};
use serde::{Deserialize, Serialize};

/// Published after every simulated frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameEvent {
    pub frame: Frame,
    pub committed: usize,
    pub skipped: usize,
    pub follow_ups: usize,
    pub state: EngineState,
}

/// Outcome of one committed intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentEvent {
    pub frame: Frame,
    pub result: IntentExecResult,
}
