//! Combat members and the registry that owns them.
//!
//! A [`Member`] owns its stats, buffs, pipelines, FSM and pipeline context.
//! Everything that mutates those lives behind `pub(crate)` methods reached
//! from the resolver or the member's own tick; hosts only read.
mod buff;
mod registry;
mod spec;

pub use buff::{ActiveBuff, BuffManager, BuffModifier, BuffSpec, BuffStage, buff_origin};
pub use registry::MemberRegistry;
pub use spec::{AttributeSpec, MemberSpec};

use std::fmt;

use crate::expr::StatLookup;
use crate::fsm::MemberFsm;
use crate::pipeline::{PipelineContext, PipelineError, PipelineManager};
use crate::stats::{StatContainer, StatError};
use crate::types::{Frame, MemberId, Vec3};

/// Team a member fights for. Members of different camps are enemies.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Camp(pub String);

impl Camp {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_enemy_of(&self, other: &Camp) -> bool {
        self != other
    }
}

impl From<&str> for Camp {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Camp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[strum(serialize_all = "camelCase")]
pub enum MemberKind {
    #[default]
    Player,
    Mob,
}

/// Read access to the world's members, as seen by expressions, pipelines
/// and area systems.
pub trait MemberView: StatLookup {
    fn contains(&self, id: MemberId) -> bool;

    fn position(&self, id: MemberId) -> Option<Vec3>;

    fn camp(&self, id: MemberId) -> Option<&Camp>;

    /// Upcast used when building evaluation contexts.
    fn stats(&self) -> &dyn StatLookup;
}

#[derive(Clone, Debug)]
pub struct Member {
    id: MemberId,
    name: String,
    camp: Camp,
    kind: MemberKind,
    position: Vec3,
    stats: StatContainer,
    buffs: BuffManager,
    pipelines: PipelineManager,
    fsm: MemberFsm,
    context: PipelineContext,
}

impl Member {
    pub fn new(id: MemberId, name: impl Into<String>, camp: Camp, kind: MemberKind) -> Self {
        Self {
            id,
            name: name.into(),
            camp,
            kind,
            position: Vec3::ZERO,
            stats: StatContainer::new(),
            buffs: BuffManager::new(),
            pipelines: PipelineManager::new(),
            fsm: MemberFsm::new(),
            context: PipelineContext::new(id),
        }
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn camp(&self) -> &Camp {
        &self.camp
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn stats(&self) -> &StatContainer {
        &self.stats
    }

    pub fn buffs(&self) -> &BuffManager {
        &self.buffs
    }

    pub fn pipelines(&self) -> &PipelineManager {
        &self.pipelines
    }

    pub fn fsm(&self) -> &MemberFsm {
        &self.fsm
    }

    /// Live pipeline context; runs work on clones and merge back.
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    // ========================================================================
    // Crate-internal mutation
    // ========================================================================

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub(crate) fn stats_mut(&mut self) -> &mut StatContainer {
        &mut self.stats
    }

    pub(crate) fn pipelines_mut(&mut self) -> &mut PipelineManager {
        &mut self.pipelines
    }

    pub(crate) fn fsm_mut(&mut self) -> &mut MemberFsm {
        &mut self.fsm
    }

    pub(crate) fn context_mut(&mut self) -> &mut PipelineContext {
        &mut self.context
    }

    /// Activates `spec`, replacing any active buff with the same id.
    ///
    /// The replaced buff's modifiers and stages are retracted first. Entries
    /// that cannot be applied (unknown attribute, missing anchor) are
    /// skipped and reported back; the rest of the buff still applies.
    pub(crate) fn apply_buff(
        &mut self,
        spec: BuffSpec,
        frame: Frame,
        source: &str,
    ) -> Vec<BuffApplyError> {
        let origin = spec.origin();
        if self.buffs.contains(&spec.id) {
            self.retract(&origin);
        }

        let mut errors = Vec::new();
        for modifier in &spec.modifiers {
            if let Err(err) =
                self.stats
                    .add_modifier(&modifier.path, modifier.bucket, modifier.value, origin.clone())
            {
                errors.push(BuffApplyError::Stat(err));
            }
        }
        for spliced in &spec.stages {
            if let Err(err) = self.pipelines.insert_stage(
                &spliced.pipeline,
                &spliced.after_stage,
                spliced.stage.clone(),
                origin.clone(),
                spliced.priority,
            ) {
                errors.push(BuffApplyError::Pipeline(err));
            }
        }
        self.buffs.add(spec, frame, source);
        errors
    }

    /// Deactivates buff `id`; `false` if it was not active.
    pub(crate) fn remove_buff(&mut self, id: &str) -> bool {
        match self.buffs.remove(id) {
            Some(active) => {
                self.retract(&active.spec.origin());
                true
            }
            None => false,
        }
    }

    /// Removes every buff whose lifetime ended by `frame`; returns their ids.
    pub(crate) fn expire_buffs(&mut self, frame: Frame) -> Vec<String> {
        let expired = self.buffs.expired(frame);
        for id in &expired {
            self.remove_buff(id);
        }
        expired
    }

    fn retract(&mut self, origin: &str) {
        self.stats.remove_modifiers_by_origin(origin);
        self.pipelines.remove_stages_by_source(origin);
    }
}

/// Part of a buff that could not be applied.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BuffApplyError {
    #[error(transparent)]
    Stat(#[from] StatError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Stage, StageKind};
    use crate::stats::ModifierBucket;

    fn member() -> Member {
        let mut member = Member::new(MemberId(1), "knight", Camp::from("blue"), MemberKind::Player);
        member.stats_mut().declare("atk", 100.0);
        member.stats_mut().add_modifier("atk", ModifierBucket::StaticFixed, 10.0, "gear").unwrap();
        member.stats_mut().add_modifier("atk", ModifierBucket::StaticPercentage, 20.0, "gear").unwrap();
        member.pipelines_mut().define(
            "attack",
            [Stage::new("hit", StageKind::Log { message: "hit".into() })],
        );
        member
    }

    fn log(id: &str) -> Stage {
        Stage::new(id, StageKind::Log { message: id.into() })
    }

    #[test]
    fn buff_adds_dynamic_percentage() {
        let mut m = member();
        assert_eq!(m.stats().get_static_value("atk"), Some(130.0));

        let buff = BuffSpec::new("rage").with_modifier("atk", ModifierBucket::DynamicPercentage, 5.0);
        assert!(m.apply_buff(buff, Frame(0), "test").is_empty());
        assert_eq!(m.stats().get_value("atk"), Some(135.0));

        assert!(m.remove_buff("rage"));
        assert_eq!(m.stats().get_value("atk"), Some(130.0));
        assert!(!m.remove_buff("rage"));
    }

    #[test]
    fn replacing_a_buff_retracts_the_old_instance() {
        let mut m = member();
        let first = BuffSpec::new("rage")
            .with_modifier("atk", ModifierBucket::DynamicFixed, 5.0)
            .with_stage(BuffStage {
                pipeline: "attack".into(),
                after_stage: "hit".into(),
                stage: log("extra"),
                priority: 0,
            });
        m.apply_buff(first, Frame(0), "test");
        let second = BuffSpec::new("rage").with_modifier("atk", ModifierBucket::DynamicFixed, 7.0);
        m.apply_buff(second, Frame(3), "test");

        assert_eq!(m.stats().get_value("atk"), Some(137.0));
        assert_eq!(m.pipelines().stage_ids("attack"), vec!["hit"]);
        assert_eq!(m.buffs().get("rage").map(|b| b.applied_at), Some(Frame(3)));
    }

    #[test]
    fn partial_buffs_report_errors() {
        let mut m = member();
        let buff = BuffSpec::new("odd")
            .with_modifier("missing.path", ModifierBucket::StaticFixed, 1.0)
            .with_modifier("atk", ModifierBucket::StaticFixed, 1.0);
        let errors = m.apply_buff(buff, Frame(0), "test");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], BuffApplyError::Stat(StatError::UnknownAttribute(_))));
        assert_eq!(m.stats().get_static_value("atk"), Some(131.0));
    }

    #[test]
    fn expiry_removes_timed_buffs() {
        let mut m = member();
        m.apply_buff(
            BuffSpec::new("short").with_duration(10).with_modifier("atk", ModifierBucket::DynamicFixed, 1.0),
            Frame(5),
            "test",
        );
        assert!(m.expire_buffs(Frame(14)).is_empty());
        assert_eq!(m.expire_buffs(Frame(15)), vec!["short".to_string()]);
        assert_eq!(m.stats().get_value("atk"), Some(130.0));
    }
}
