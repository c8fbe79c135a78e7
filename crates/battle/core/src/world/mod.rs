//! Per-frame orchestration of members and areas.
//!
//! One [`World::tick`] runs, in order: intents whose scheduled frame has
//! come, every member's tick in registry order, then the area systems.
//! The result is the frame's intent buffer; committing it is the engine's
//! job.

mod snapshot;

pub use snapshot::{MemberSnapshot, MemberSummary, WorldSnapshot};

use crate::area::{AreaId, AreaManager, AreaRequest, SpatialGrid};
use crate::config::EngineConfig;
use crate::data::BattleData;
use crate::event_queue::EventQueue;
use crate::expr::{EvalContext, ExpressionEvaluator};
use crate::fsm::{ActionPlan, FsmError, FsmReaction, QueuedSkill, SkillBook, SkillTiming};
use crate::intent::Intent;
use crate::member::{Member, MemberRegistry};
use crate::pipeline::ActionOutput;
use crate::types::{Frame, MemberId, Vec3};

/// What one world tick produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameOutput {
    /// Intents to commit this frame, in production order.
    pub intents: Vec<Intent>,
    /// FSM reactions from member ticks.
    pub reactions: Vec<(MemberId, FsmReaction)>,
}

#[derive(Clone, Debug)]
pub struct World {
    registry: MemberRegistry,
    areas: AreaManager,
    skills: SkillBook,
    grid: SpatialGrid,
    health_path: String,
}

impl World {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            registry: MemberRegistry::new(),
            areas: AreaManager::new(),
            skills: SkillBook::new(),
            grid: SpatialGrid::new(config.spatial_cell_size),
            health_path: config.health_path.clone(),
        }
    }

    /// Replaces the world's contents with `data`; returns member ids in
    /// registry order.
    pub fn populate(&mut self, data: &BattleData) -> Vec<MemberId> {
        self.registry.clear();
        self.areas.clear();
        self.skills = data.skill_book();
        for spec in &data.members {
            self.registry.insert_spec_with(spec, &data.pipelines);
        }
        tracing::info!(
            target: "battle::world",
            members = self.registry.len(),
            skills = self.skills.len(),
            "world populated"
        );
        self.registry.ids().to_vec()
    }

    pub fn registry(&self) -> &MemberRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut MemberRegistry {
        &mut self.registry
    }

    pub fn areas(&self) -> &AreaManager {
        &self.areas
    }

    pub fn skills(&self) -> &SkillBook {
        &self.skills
    }

    pub fn health(&self, id: MemberId) -> Option<f64> {
        self.registry.get(id)?.stats().get_value(&self.health_path)
    }

    // ========================================================================
    // Frame tick
    // ========================================================================

    pub fn tick(
        &mut self,
        frame: Frame,
        queue: &mut EventQueue,
        evaluator: &mut ExpressionEvaluator,
    ) -> FrameOutput {
        let mut out = FrameOutput::default();

        for event in queue.pop_due(frame) {
            out.intents.push(event.payload);
        }

        let ids = self.registry.ids().to_vec();
        for id in ids {
            self.tick_member(id, frame, queue, evaluator, &mut out);
        }

        self.grid.rebuild(&self.registry);
        out.intents.extend(self.areas.tick(frame, &self.grid));
        out
    }

    fn tick_member(
        &mut self,
        id: MemberId,
        frame: Frame,
        queue: &mut EventQueue,
        evaluator: &mut ExpressionEvaluator,
        out: &mut FrameOutput,
    ) {
        let Some(member) = self.registry.get_mut(id) else {
            return;
        };
        for buff in member.expire_buffs(frame) {
            tracing::debug!(target: "battle::world", member = %id, %buff, "buff expired");
        }

        let pending = member
            .fsm()
            .wants_plan()
            .then(|| member.fsm().next_pending().cloned())
            .flatten();
        let plan = pending.and_then(|queued| match self.resolve_plan(id, &queued, evaluator) {
            Ok(plan) => Some(plan),
            Err(err) => {
                tracing::warn!(target: "battle::fsm", member = %id, error = %err, "cannot start skill");
                None
            }
        });

        let Some(member) = self.registry.get_mut(id) else {
            return;
        };
        let reactions = member.fsm_mut().step(plan);

        for reaction in reactions {
            if let FsmReaction::RunPipeline {
                pipeline,
                skill_id,
                target,
            } = &reaction
            {
                let result = self.registry.run_pipeline(id, pipeline, evaluator, frame, |ctx| {
                    ctx.target = *target;
                    ctx.skill_id = Some(skill_id.clone());
                });
                match result {
                    Ok(outputs) => {
                        let intents = self.route_outputs(outputs, frame, queue, evaluator);
                        out.intents.extend(intents);
                    }
                    Err(err) => tracing::warn!(
                        target: "battle::pipeline",
                        member = %id,
                        %pipeline,
                        error = %err,
                        "pipeline run failed"
                    ),
                }
            }
            out.reactions.push((id, reaction));
        }
    }

    /// Evaluates the skill's frame expressions with the caster as `self`.
    fn resolve_plan(
        &self,
        id: MemberId,
        queued: &QueuedSkill,
        evaluator: &mut ExpressionEvaluator,
    ) -> Result<ActionPlan, FsmError> {
        let skill = self
            .skills
            .get(&queued.skill_id)
            .ok_or_else(|| FsmError::UnknownSkill(queued.skill_id.clone()))?;

        let ctx = EvalContext::new(id, &self.registry).with_target(queued.target);
        let mut frames = |expression: &str| -> u64 {
            let value = evaluator.evaluate_number_or_zero(expression, &ctx);
            if value.is_finite() && value > 0.0 {
                value.floor() as u64
            } else {
                0
            }
        };
        let timing = SkillTiming::new(
            frames(skill.startup_frames.as_str()),
            frames(skill.chanting_frames.as_str()),
            frames(skill.charging_frames.as_str()),
            frames(skill.recovery_frames.as_str()),
        );

        Ok(ActionPlan {
            skill_id: skill.id.clone(),
            target: queued.target,
            timing,
            uninterruptible: skill.uninterruptible,
            start_pipeline: skill.start_pipeline.clone(),
            pipeline: skill.pipeline.clone(),
        })
    }

    // ========================================================================
    // Output routing
    // ========================================================================

    /// Carries out non-intent outputs and returns the intents.
    pub(crate) fn route_outputs(
        &mut self,
        outputs: Vec<ActionOutput>,
        frame: Frame,
        queue: &mut EventQueue,
        evaluator: &mut ExpressionEvaluator,
    ) -> Vec<Intent> {
        let mut intents = Vec::new();
        for output in outputs {
            match output {
                ActionOutput::Intent(intent) => intents.push(intent),
                ActionOutput::SpawnArea(request) => {
                    self.spawn_area(request, evaluator);
                }
                ActionOutput::Schedule {
                    delay_frames,
                    priority,
                    intent,
                } => queue.schedule(frame + delay_frames, priority, intent),
            }
        }
        intents
    }

    /// Compiles the area's damage expression and instantiates it. Areas
    /// whose expression does not compile are dropped.
    pub(crate) fn spawn_area(
        &mut self,
        mut request: AreaRequest,
        evaluator: &mut ExpressionEvaluator,
    ) -> Option<AreaId> {
        if let Some(expression) = request.expression_mut() {
            match evaluator.compile(expression) {
                Ok(compiled) => *expression = compiled,
                Err(err) => {
                    tracing::warn!(
                        target: "battle::area",
                        source = request.source(),
                        error = %err,
                        "area dropped: damage expression does not compile"
                    );
                    return None;
                }
            }
        }
        Some(self.areas.add(request))
    }

    // ========================================================================
    // Host operations
    // ========================================================================

    pub(crate) fn teleport(&mut self, id: MemberId, position: Vec3) -> bool {
        match self.registry.get_mut(id) {
            Some(member) => {
                member.set_position(position);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_member(&mut self, id: MemberId) -> Option<Member> {
        self.registry.remove(id)
    }

    pub fn snapshot(&self, frame: Frame, queue: &EventQueue) -> WorldSnapshot {
        WorldSnapshot {
            frame,
            members: self.registry.iter().map(MemberSnapshot::capture).collect(),
            areas: self.areas.summaries(frame),
            scheduled_events: queue.len(),
        }
    }

    pub fn summaries(&self) -> Vec<MemberSummary> {
        self.registry
            .iter()
            .map(|member| MemberSummary {
                id: member.id(),
                name: member.name().to_string(),
                camp: member.camp().clone(),
                kind: member.kind(),
                position: member.position(),
                state: member.fsm().state(),
                health: member.stats().get_value(&self.health_path),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.registry.clear();
        self.areas.clear();
        self.skills.clear();
    }
}
