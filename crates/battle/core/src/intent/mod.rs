//! Intents: the only way one subsystem changes state owned by another.
//!
//! Members, pipelines and area systems never touch each other directly.
//! They emit [`Intent`]s into the frame buffer and the [`Resolver`] applies
//! them in production order once per frame.
mod error;
mod resolver;

pub use error::IntentError;
pub use resolver::{CommitOutcome, Resolver};

use crate::expr::Locals;
use crate::fsm::FsmEvent;
use crate::member::BuffSpec;
use crate::pipeline::Stage;
use crate::stats::ModifierBucket;
use crate::types::MemberId;

/// Stat change carried by a `modifyStat` intent.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")
)]
pub enum StatMutation {
    AddBase {
        value: f64,
    },
    SetBase {
        value: f64,
    },
    AddModifier {
        bucket: ModifierBucket,
        value: f64,
        origin: String,
    },
    RemoveModifiersByOrigin {
        origin: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")
)]
pub enum IntentPayload {
    SendFsmEvent {
        event: FsmEvent,
    },
    /// Re-runs a pipeline of the subject against a working copy of its
    /// context. `vars` are overlaid on that copy first.
    RunPipeline {
        pipeline: String,
        #[cfg_attr(feature = "serde", serde(default))]
        vars: Locals,
    },
    AddBuff {
        buff: BuffSpec,
    },
    /// With `granted_by` set, only an instance applied by that source is
    /// removed; any other holder of the id keeps it.
    RemoveBuff {
        buff_id: String,
        #[cfg_attr(feature = "serde", serde(default))]
        granted_by: Option<String>,
    },
    ModifyStat {
        path: String,
        mutation: StatMutation,
    },
    InsertPipelineStage {
        pipeline: String,
        after_stage: String,
        stage: Stage,
        #[cfg_attr(feature = "serde", serde(default))]
        priority: i32,
    },
    RemovePipelineStagesBySource {
        stage_source: String,
    },
}

impl IntentPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            IntentPayload::SendFsmEvent { .. } => "sendFsmEvent",
            IntentPayload::RunPipeline { .. } => "runPipeline",
            IntentPayload::AddBuff { .. } => "addBuff",
            IntentPayload::RemoveBuff { .. } => "removeBuff",
            IntentPayload::ModifyStat { .. } => "modifyStat",
            IntentPayload::InsertPipelineStage { .. } => "insertPipelineStage",
            IntentPayload::RemovePipelineStagesBySource { .. } => "removePipelineStagesBySource",
        }
    }
}

/// A requested effect on one member.
///
/// `actor_id` is who caused it; the effect lands on [`Intent::subject`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Intent {
    pub actor_id: MemberId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub target_id: Option<MemberId>,
    /// Attribution string (`skill:fireball`, `area:3`, `host`).
    #[cfg_attr(feature = "serde", serde(default))]
    pub source: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub payload: IntentPayload,
}

impl Intent {
    pub fn new(actor_id: MemberId, payload: IntentPayload) -> Self {
        Self {
            actor_id,
            target_id: None,
            source: String::new(),
            payload,
        }
    }

    pub fn with_target(mut self, target_id: Option<MemberId>) -> Self {
        self.target_id = target_id;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Member the intent is applied to.
    pub fn subject(&self) -> MemberId {
        self.target_id.unwrap_or(self.actor_id)
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "status", rename_all = "camelCase")
)]
pub enum IntentStatus {
    Ok,
    Skipped { reason: String },
}

/// Per-intent report from [`Resolver::commit`], in commit order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct IntentExecResult {
    pub index: usize,
    pub kind: String,
    pub actor_id: MemberId,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub status: IntentStatus,
}

impl IntentExecResult {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, IntentStatus::Ok)
    }
}
