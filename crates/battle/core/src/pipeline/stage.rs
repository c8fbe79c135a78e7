//! Data-driven stage definitions.

use crate::area::{BuffAreaSpec, DamageAreaSpec, TrapAreaSpec};
use crate::member::BuffSpec;
use crate::stats::ModifierBucket;

/// Which side of the pipeline context a stage acts on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[strum(serialize_all = "camelCase")]
pub enum StageTarget {
    /// The pipeline's caster.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "self"))]
    #[strum(serialize = "self")]
    Caster,
    Target,
}

/// Stat operation performed by a `modifyStat` stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[strum(serialize_all = "camelCase")]
pub enum StatOp {
    AddBase,
    SetBase,
    AddModifier,
    RemoveModifiersByOrigin,
}

/// FSM event emitted by a `sendEvent` stage.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")
)]
pub enum StageEvent {
    Damage {
        expression: String,
        #[cfg_attr(feature = "serde", serde(default = "one"))]
        attack_count: u32,
        #[cfg_attr(feature = "serde", serde(default = "one"))]
        damage_count: u32,
    },
    UseSkill {
        skill_id: String,
    },
    Interrupt,
    ClearQueue,
}

#[cfg(feature = "serde")]
fn one() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")
)]
pub enum StageKind {
    /// Evaluates `value` into context variable `name`.
    SetVar { name: String, value: String },
    ModifyStat {
        #[cfg_attr(feature = "serde", serde(default))]
        target: StageTarget,
        path: String,
        op: StatOp,
        #[cfg_attr(feature = "serde", serde(default))]
        value: Option<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        bucket: Option<ModifierBucket>,
        #[cfg_attr(feature = "serde", serde(default))]
        origin: Option<String>,
    },
    ApplyBuff {
        #[cfg_attr(feature = "serde", serde(default))]
        target: StageTarget,
        buff: BuffSpec,
    },
    RemoveBuff {
        #[cfg_attr(feature = "serde", serde(default))]
        target: StageTarget,
        buff_id: String,
    },
    SendEvent {
        #[cfg_attr(feature = "serde", serde(default))]
        target: StageTarget,
        event: StageEvent,
    },
    RunPipeline {
        #[cfg_attr(feature = "serde", serde(default))]
        target: StageTarget,
        pipeline: String,
    },
    SpawnDamageArea(DamageAreaSpec),
    SpawnBuffArea(BuffAreaSpec),
    SpawnTrapArea(TrapAreaSpec),
    /// Runs `then` now but delivers its intents `delay_frames` later.
    Schedule {
        delay_frames: u64,
        #[cfg_attr(feature = "serde", serde(default))]
        priority: i32,
        then: Box<StageKind>,
    },
    Log { message: String },
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::SetVar { .. } => "setVar",
            StageKind::ModifyStat { .. } => "modifyStat",
            StageKind::ApplyBuff { .. } => "applyBuff",
            StageKind::RemoveBuff { .. } => "removeBuff",
            StageKind::SendEvent { .. } => "sendEvent",
            StageKind::RunPipeline { .. } => "runPipeline",
            StageKind::SpawnDamageArea(_) => "spawnDamageArea",
            StageKind::SpawnBuffArea(_) => "spawnBuffArea",
            StageKind::SpawnTrapArea(_) => "spawnTrapArea",
            StageKind::Schedule { .. } => "schedule",
            StageKind::Log { .. } => "log",
        }
    }
}

/// A named step of a pipeline.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stage {
    pub id: String,
    /// Optional guard; the stage is skipped when it evaluates to false.
    #[cfg_attr(feature = "serde", serde(default))]
    pub when: Option<String>,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: StageKind,
}

impl Stage {
    pub fn new(id: impl Into<String>, kind: StageKind) -> Self {
        Self {
            id: id.into(),
            when: None,
            kind,
        }
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.when = Some(condition.into());
        self
    }
}
