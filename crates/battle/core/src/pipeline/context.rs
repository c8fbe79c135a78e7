use crate::area::AreaRequest;
use crate::expr::{Locals, Value};
use crate::intent::Intent;
use crate::types::MemberId;

/// Context fed through a pipeline's stages.
///
/// Each member keeps a live copy. Runs operate on a working copy which the
/// caller merges back with [`PipelineContext::merge`]; later expressions
/// read the variables earlier runs computed.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineContext {
    pub caster: MemberId,
    pub target: Option<MemberId>,
    pub skill_id: Option<String>,
    pub vars: Locals,
}

impl PipelineContext {
    pub fn new(caster: MemberId) -> Self {
        Self {
            caster,
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: Option<MemberId>) -> Self {
        self.target = target;
        self
    }

    pub fn with_skill(mut self, skill_id: impl Into<String>) -> Self {
        self.skill_id = Some(skill_id.into());
        self
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Overlays `other` onto `self`: variables are upserted, identity
    /// fields take `other`'s values.
    pub fn merge(&mut self, other: PipelineContext) {
        self.target = other.target;
        if other.skill_id.is_some() {
            self.skill_id = other.skill_id;
        }
        self.vars.extend(other.vars);
    }
}

/// Something a stage produced for the world to carry out.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionOutput {
    Intent(Intent),
    SpawnArea(AreaRequest),
    Schedule {
        delay_frames: u64,
        priority: i32,
        intent: Intent,
    },
}

/// Result of one pipeline run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineRun {
    pub ctx: PipelineContext,
    pub outputs: Vec<ActionOutput>,
}
