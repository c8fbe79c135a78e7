use super::state::{MemberState, SkillTiming};
use crate::expr::Locals;
use crate::types::MemberId;

/// Damage delivered to a member.
///
/// The expression is evaluated by the resolver with the source as `self`
/// and the receiver as `target`; `vars` become locals (`distance`,
/// `targetCount`, ...). The per-hit result is applied `damage_count` times.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DamageRequest {
    pub source: MemberId,
    pub expression: String,
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub attack_count: u32,
    #[cfg_attr(feature = "serde", serde(default = "one"))]
    pub damage_count: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub vars: Locals,
}

#[cfg(feature = "serde")]
fn one() -> u32 {
    1
}

impl DamageRequest {
    pub fn new(source: MemberId, expression: impl Into<String>) -> Self {
        Self {
            source,
            expression: expression.into(),
            attack_count: 1,
            damage_count: 1,
            vars: Locals::new(),
        }
    }
}

/// Typed message handled by [`super::MemberFsm::handle`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")
)]
pub enum FsmEvent {
    /// Queue a skill use.
    UseSkill {
        skill_id: String,
        #[cfg_attr(feature = "serde", serde(default))]
        target: Option<MemberId>,
    },
    /// Damage was received ("受到攻击"). Interrupts casts.
    TakeDamage(DamageRequest),
    /// Abort the current action.
    Interrupt,
    /// Drop every queued action.
    ClearQueue,
}

impl FsmEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FsmEvent::UseSkill { .. } => "use_skill",
            FsmEvent::TakeDamage(_) => "take_damage",
            FsmEvent::Interrupt => "interrupt",
            FsmEvent::ClearQueue => "clear_queue",
        }
    }
}

/// Side effects reported by the FSM for its owner to carry out.
#[derive(Clone, Debug, PartialEq)]
pub enum FsmReaction {
    ActionStarted {
        skill_id: String,
        target: Option<MemberId>,
        timing: SkillTiming,
    },
    StateChanged {
        from: MemberState,
        to: MemberState,
    },
    RunPipeline {
        pipeline: String,
        skill_id: String,
        target: Option<MemberId>,
    },
    ActionFinished {
        skill_id: String,
    },
    Interrupted {
        skill_id: String,
    },
    SequenceCompleted,
}
