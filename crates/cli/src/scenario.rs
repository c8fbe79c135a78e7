//! Scenario files: battle data plus a scripted intent timeline.

use std::path::Path;

use anyhow::{Context, Result};
use battle_core::{BattleData, Intent};
use serde::Deserialize;

/// Intent delivered right before `frame` is simulated.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptedIntent {
    pub frame: u64,
    pub intent: Intent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(flatten)]
    pub data: BattleData,
    #[serde(default = "default_frames")]
    pub frames: u32,
    #[serde(default)]
    pub script: Vec<ScriptedIntent>,
}

fn default_frames() -> u32 {
    600
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let mut scenario: Scenario = serde_json::from_str(&raw)
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        scenario.script.sort_by_key(|entry| entry.frame);
        Ok(scenario)
    }

    /// Frame segments to step: `(intents to post, frames to advance)`.
    ///
    /// Scripted frames past the end of the run are ignored.
    pub fn timeline(&self) -> Vec<(Vec<Intent>, u32)> {
        let total = u64::from(self.frames);
        let mut segments: Vec<(Vec<Intent>, u32)> = Vec::new();
        let mut cursor = 0u64;
        let mut pending = Vec::new();

        for entry in self.script.iter().filter(|e| e.frame < total) {
            if entry.frame > cursor {
                segments.push((std::mem::take(&mut pending), (entry.frame - cursor) as u32));
                cursor = entry.frame;
            }
            pending.push(entry.intent.clone());
        }
        segments.push((pending, (total - cursor) as u32));
        segments.retain(|(intents, frames)| !intents.is_empty() || *frames > 0);
        segments
    }
}
