//! Per-member action state machine.
//!
//! The machine stores the action clock, never the phase: every tick bumps
//! `action_frame_index` and the phase is re-derived with
//! [`derive_state`](super::derive_state). Phase changes produce pipeline
//! hooks as [`FsmReaction`]s; running those pipelines is the owner's job.

use std::collections::VecDeque;

use super::event::{FsmEvent, FsmReaction};
use super::state::{MemberState, SkillTiming, derive_state};
use crate::types::MemberId;

/// A queued skill use waiting for the member to become free.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueuedSkill {
    pub skill_id: String,
    pub target: Option<MemberId>,
}

/// Resolved parameters for starting the front queued skill.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionPlan {
    pub skill_id: String,
    pub target: Option<MemberId>,
    pub timing: SkillTiming,
    pub uninterruptible: bool,
    pub start_pipeline: Option<String>,
    pub pipeline: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
struct ActiveAction {
    plan: ActionPlan,
    frame_index: u64,
    effect_fired: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemberFsm {
    current: Option<ActiveAction>,
    queue: VecDeque<QueuedSkill>,
    state: MemberState,
}

impl MemberFsm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MemberState {
        self.state
    }

    pub fn action_frame_index(&self) -> Option<u64> {
        self.current.as_ref().map(|a| a.frame_index)
    }

    pub fn current_skill(&self) -> Option<&str> {
        self.current.as_ref().map(|a| a.plan.skill_id.as_str())
    }

    pub fn current_target(&self) -> Option<MemberId> {
        self.current.as_ref().and_then(|a| a.plan.target)
    }

    pub fn queued(&self) -> impl Iterator<Item = &QueuedSkill> {
        self.queue.iter()
    }

    /// Skill that the next [`step`](Self::step) may start, if any.
    pub fn next_pending(&self) -> Option<&QueuedSkill> {
        self.queue.front()
    }

    /// Whether the next [`step`](Self::step) may start the queued front
    /// skill, i.e. whether the owner needs to resolve a plan for it.
    pub fn wants_plan(&self) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        self.current
            .as_ref()
            .is_none_or(|a| a.frame_index + 1 >= a.plan.timing.duration())
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    /// Single dispatch point for external events.
    ///
    /// `TakeDamage` only concerns the FSM as an interruption; applying the
    /// damage itself is done by whoever delivered it.
    pub fn handle(&mut self, event: &FsmEvent) -> Vec<FsmReaction> {
        let mut out = Vec::new();
        match event {
            FsmEvent::UseSkill { skill_id, target } => {
                self.queue.push_back(QueuedSkill {
                    skill_id: skill_id.clone(),
                    target: *target,
                });
            }
            FsmEvent::TakeDamage(_) => {
                if self.state.is_casting() {
                    self.interrupt(&mut out);
                }
            }
            FsmEvent::Interrupt => self.interrupt(&mut out),
            FsmEvent::ClearQueue => self.queue.clear(),
        }
        out
    }

    /// Advances the action clock by one frame.
    ///
    /// `front_plan` must be the resolved plan for [`next_pending`]
    /// (`None` if it could not be resolved; the entry is then dropped).
    ///
    /// [`next_pending`]: Self::next_pending
    pub fn step(&mut self, front_plan: Option<ActionPlan>) -> Vec<FsmReaction> {
        let mut out = Vec::new();
        let mut front_plan = front_plan;

        match self.current.as_mut() {
            Some(action) => {
                action.frame_index += 1;
                let index = action.frame_index;
                let next = derive_state(index, &action.plan.timing);
                self.transition(next, &mut out);
                if self.current_finished() {
                    self.finish(&mut out);
                    self.start_next(&mut front_plan, &mut out);
                }
            }
            None => self.start_next(&mut front_plan, &mut out),
        }
        out
    }

    fn current_finished(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|a| a.frame_index >= a.plan.timing.duration())
    }

    fn start_next(&mut self, plan: &mut Option<ActionPlan>, out: &mut Vec<FsmReaction>) {
        let Some(queued) = self.queue.pop_front() else {
            return;
        };
        let Some(plan) = plan.take().filter(|p| p.skill_id == queued.skill_id) else {
            tracing::debug!(
                target: "battle::fsm",
                skill = %queued.skill_id,
                "dropping queued skill without a resolved plan"
            );
            return;
        };

        out.push(FsmReaction::ActionStarted {
            skill_id: plan.skill_id.clone(),
            target: plan.target,
            timing: plan.timing,
        });
        self.current = Some(ActiveAction {
            plan,
            frame_index: 0,
            effect_fired: false,
        });
        let initial = self
            .current
            .as_ref()
            .map(|a| derive_state(0, &a.plan.timing))
            .unwrap_or_default();
        self.transition(initial, out);
        if self.current_finished() {
            self.finish(out);
        }
    }

    /// Applies a derived phase and emits the hooks tied to entering it.
    fn transition(&mut self, next: MemberState, out: &mut Vec<FsmReaction>) {
        let Some(action) = self.current.as_mut() else {
            return;
        };

        if next == MemberState::Startup && self.state != MemberState::Startup {
            if let Some(pipeline) = &action.plan.start_pipeline {
                out.push(FsmReaction::RunPipeline {
                    pipeline: pipeline.clone(),
                    skill_id: action.plan.skill_id.clone(),
                    target: action.plan.target,
                });
            }
        }

        let cast_closed = matches!(next, MemberState::Recovery | MemberState::Free);
        if cast_closed && !action.effect_fired {
            action.effect_fired = true;
            if let Some(pipeline) = &action.plan.pipeline {
                out.push(FsmReaction::RunPipeline {
                    pipeline: pipeline.clone(),
                    skill_id: action.plan.skill_id.clone(),
                    target: action.plan.target,
                });
            }
        }

        if next != self.state {
            out.push(FsmReaction::StateChanged {
                from: self.state,
                to: next,
            });
            self.state = next;
        }
    }

    fn finish(&mut self, out: &mut Vec<FsmReaction>) {
        if let Some(action) = self.current.take() {
            out.push(FsmReaction::ActionFinished {
                skill_id: action.plan.skill_id,
            });
        }
        if self.state != MemberState::Free {
            out.push(FsmReaction::StateChanged {
                from: self.state,
                to: MemberState::Free,
            });
            self.state = MemberState::Free;
        }
        if self.queue.is_empty() {
            out.push(FsmReaction::SequenceCompleted);
        }
    }

    fn interrupt(&mut self, out: &mut Vec<FsmReaction>) {
        let Some(action) = self.current.as_ref() else {
            return;
        };
        if action.plan.uninterruptible {
            return;
        }
        let skill_id = action.plan.skill_id.clone();
        self.current = None;
        out.push(FsmReaction::Interrupted { skill_id });
        if self.state != MemberState::Free {
            out.push(FsmReaction::StateChanged {
                from: self.state,
                to: MemberState::Free,
            });
            self.state = MemberState::Free;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::event::DamageRequest;

    fn plan(skill: &str, timing: SkillTiming) -> ActionPlan {
        ActionPlan {
            skill_id: skill.into(),
            target: Some(MemberId(9)),
            timing,
            uninterruptible: false,
            start_pipeline: Some("start".into()),
            pipeline: Some("effect".into()),
        }
    }

    fn use_skill(fsm: &mut MemberFsm, skill: &str) {
        fsm.handle(&FsmEvent::UseSkill {
            skill_id: skill.into(),
            target: Some(MemberId(9)),
        });
    }

    fn pipelines(reactions: &[FsmReaction]) -> Vec<&str> {
        reactions
            .iter()
            .filter_map(|r| match r {
                FsmReaction::RunPipeline { pipeline, .. } => Some(pipeline.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn full_lifecycle_fires_hooks_once() {
        let timing = SkillTiming::new(2, 1, 0, 1);
        let mut fsm = MemberFsm::new();
        use_skill(&mut fsm, "slash");

        let r = fsm.step(Some(plan("slash", timing)));
        assert_eq!(fsm.state(), MemberState::Startup);
        assert_eq!(pipelines(&r), vec!["start"]);

        let mut seen = Vec::new();
        for _ in 0..4 {
            let r = fsm.step(None);
            seen.extend(pipelines(&r).into_iter().map(String::from));
            seen.push(fsm.state().to_string());
        }
        assert_eq!(
            seen,
            vec!["startup", "chanting", "effect", "recovery", "free"]
        );
        assert!(fsm.is_idle());
    }

    #[test]
    fn completion_reports_sequence_end_or_starts_next() {
        let timing = SkillTiming::new(1, 0, 0, 0);
        let mut fsm = MemberFsm::new();
        use_skill(&mut fsm, "a");
        use_skill(&mut fsm, "b");

        fsm.step(Some(plan("a", timing)));
        let r = fsm.step(Some(plan("b", timing)));
        assert!(r.contains(&FsmReaction::ActionFinished { skill_id: "a".into() }));
        assert!(!r.contains(&FsmReaction::SequenceCompleted));
        assert_eq!(fsm.current_skill(), Some("b"));

        let r = fsm.step(None);
        assert!(r.contains(&FsmReaction::SequenceCompleted));
        assert_eq!(fsm.state(), MemberState::Free);
    }

    #[test]
    fn damage_interrupts_cast_but_not_recovery() {
        let timing = SkillTiming::new(1, 2, 0, 3);
        let damage = FsmEvent::TakeDamage(DamageRequest::new(MemberId(2), "1"));

        let mut fsm = MemberFsm::new();
        use_skill(&mut fsm, "fire");
        use_skill(&mut fsm, "ice");
        fsm.step(Some(plan("fire", timing)));
        fsm.step(None);
        assert_eq!(fsm.state(), MemberState::Chanting);

        let r = fsm.handle(&damage);
        assert!(r.contains(&FsmReaction::Interrupted { skill_id: "fire".into() }));
        assert_eq!(fsm.state(), MemberState::Free);
        // The rest of the queue survives the interruption.
        assert_eq!(fsm.next_pending().map(|q| q.skill_id.as_str()), Some("ice"));

        fsm.step(Some(plan("ice", timing)));
        for _ in 0..3 {
            fsm.step(None);
        }
        assert_eq!(fsm.state(), MemberState::Recovery);
        assert!(fsm.handle(&damage).is_empty());
        assert_eq!(fsm.current_skill(), Some("ice"));
    }

    #[test]
    fn uninterruptible_skill_ignores_damage() {
        let mut fsm = MemberFsm::new();
        use_skill(&mut fsm, "guard");
        let mut p = plan("guard", SkillTiming::new(3, 0, 0, 0));
        p.uninterruptible = true;
        fsm.step(Some(p));
        let r = fsm.handle(&FsmEvent::TakeDamage(DamageRequest::new(MemberId(2), "1")));
        assert!(r.is_empty());
        assert_eq!(fsm.state(), MemberState::Startup);
    }

    #[test]
    fn zero_length_skill_fires_effect_and_completes_in_one_step() {
        let mut fsm = MemberFsm::new();
        use_skill(&mut fsm, "blink");
        let r = fsm.step(Some(plan("blink", SkillTiming::default())));
        assert_eq!(pipelines(&r), vec!["effect"]);
        assert!(r.contains(&FsmReaction::SequenceCompleted));
        assert!(fsm.is_idle());
    }

    #[test]
    fn unresolved_plan_drops_queue_entry() {
        let mut fsm = MemberFsm::new();
        use_skill(&mut fsm, "unknown");
        assert!(fsm.step(None).is_empty());
        assert!(fsm.is_idle());
    }

    #[test]
    fn clear_queue_keeps_current_action() {
        let mut fsm = MemberFsm::new();
        use_skill(&mut fsm, "a");
        use_skill(&mut fsm, "b");
        fsm.step(Some(plan("a", SkillTiming::new(5, 0, 0, 0))));
        fsm.handle(&FsmEvent::ClearQueue);
        assert_eq!(fsm.queued().count(), 0);
        assert_eq!(fsm.current_skill(), Some("a"));
    }

    #[test]
    fn plan_is_wanted_only_when_a_start_is_possible() {
        let mut fsm = MemberFsm::new();
        assert!(!fsm.wants_plan());
        use_skill(&mut fsm, "a");
        assert!(fsm.wants_plan());
        fsm.step(Some(plan("a", SkillTiming::new(2, 0, 0, 1))));
        use_skill(&mut fsm, "b");
        assert!(!fsm.wants_plan());
        fsm.step(None);
        assert!(!fsm.wants_plan());
        fsm.step(None);
        assert!(fsm.wants_plan());
    }
}
