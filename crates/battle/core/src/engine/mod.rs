//! Session lifecycle and the per-frame commit pipeline.
//!
//! The [`GameEngine`] is the composition root of one battle. It owns the
//! [`World`], the host inbox, the frame clock, the scheduled-event queue and
//! the [`Resolver`]. Every state mutation of a frame flows through the same
//! path: collect intents, commit them in production order, then route what
//! the committed pipelines produced.

mod errors;
mod frame_loop;
mod router;

pub use errors::{EngineError, EngineState};
pub use frame_loop::FrameLoop;
pub use router::MessageRouter;

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::data::BattleData;
use crate::event_queue::EventQueue;
use crate::expr::{AccessorRoot, CacheStats, ExpressionEvaluator};
use crate::fsm::FsmReaction;
use crate::intent::{Intent, IntentExecResult, Resolver};
use crate::render::{RenderCommand, RenderEmitter, RenderKind};
use crate::types::{Frame, MemberId, Vec3};
use crate::world::{MemberSummary, World, WorldSnapshot};

/// Outcome of one [`GameEngine::step`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct FrameReport {
    pub frame: Frame,
    /// One entry per committed intent, in commit order.
    pub results: Vec<IntentExecResult>,
    /// Intents carried into the next frame.
    pub follow_ups: usize,
}

impl FrameReport {
    pub fn ok_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }
}

/// Counters exposed to hosts.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct EngineStats {
    pub state: EngineState,
    pub frame: Frame,
    pub members: usize,
    pub areas: usize,
    pub scheduled_events: usize,
    pub pending_intents: usize,
    pub intents_ok: u64,
    pub intents_skipped: u64,
    pub dropped_follow_ups: u64,
    /// Host intents handed to the simulation this session.
    pub routed_intents: u64,
    /// Logical time at the start of the current frame.
    pub elapsed_millis: f64,
    pub cache: CacheStats,
}

/// One battle session.
///
/// Nothing here is global: hosts create one engine per session and thread
/// it through explicitly. Render sequence numbers keep counting across
/// restarts of the same engine, so a renderer may keep its reconciler.
#[derive(Debug)]
pub struct GameEngine {
    config: EngineConfig,
    state: EngineState,
    world: World,
    router: MessageRouter,
    frame_loop: FrameLoop,
    queue: EventQueue,
    resolver: Resolver,
    evaluator: ExpressionEvaluator,
    render: RenderEmitter,
    follow_ups: Vec<Intent>,
    dropped_follow_ups: u64,
}

impl GameEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: EngineState::Idle,
            world: World::new(&config),
            router: MessageRouter::new(),
            frame_loop: FrameLoop::new(config.fps),
            queue: EventQueue::new(),
            resolver: Resolver::new(config.health_path.clone()),
            evaluator: ExpressionEvaluator::new(config.eval_cache_capacity),
            render: RenderEmitter::new(config.frame_millis()),
            follow_ups: Vec::new(),
            dropped_follow_ups: 0,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Frame the next step will simulate.
    pub fn frame(&self) -> Frame {
        self.frame_loop.current()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Loads `data` and starts simulating from frame zero.
    pub fn start(&mut self, data: &BattleData) -> Result<(), EngineError> {
        if matches!(self.state, EngineState::Running | EngineState::Paused) {
            return Err(EngineError::AlreadyStarted(self.state));
        }
        data.validate()?;

        self.reset_session();
        if let Some(schema) = &data.stat_schema {
            self.evaluator
                .set_schema(AccessorRoot::SelfMember, schema.clone());
            self.evaluator.set_schema(AccessorRoot::Target, schema.clone());
        }

        let frame = self.frame();
        for id in self.world.populate(data) {
            if let Some(member) = self.world.registry().get(id) {
                let kind = RenderKind::Spawn {
                    name: member.name().to_string(),
                    camp: member.camp().clone(),
                    member_kind: member.kind(),
                    position: member.position(),
                };
                self.render.emit(id, frame, kind);
            }
        }

        self.state = EngineState::Running;
        tracing::info!(
            target: "battle::engine",
            members = self.world.registry().len(),
            fps = self.config.fps,
            "simulation started"
        );
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Running {
            return Err(EngineError::NotRunning(self.state));
        }
        self.state = EngineState::Paused;
        tracing::info!(target: "battle::engine", frame = %self.frame(), "simulation paused");
        Ok(())
    }

    /// Continues from the frame where the engine paused. Every member gets a
    /// `reconcile` render so a renderer that dropped commands can resync.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Paused {
            return Err(EngineError::NotPaused(self.state));
        }
        self.state = EngineState::Running;

        let frame = self.frame();
        let ids = self.world.registry().ids().to_vec();
        for id in ids {
            let Some(member) = self.world.registry().get(id) else {
                continue;
            };
            let kind = RenderKind::Reconcile {
                position: member.position(),
                props: self.health_props(id),
            };
            self.render.emit(id, frame, kind);
        }
        tracing::info!(target: "battle::engine", %frame, "simulation resumed");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), EngineError> {
        match self.state {
            EngineState::Running | EngineState::Paused => {
                self.state = EngineState::Stopped;
                tracing::info!(target: "battle::engine", frame = %self.frame(), "simulation stopped");
                Ok(())
            }
            EngineState::Idle => Err(EngineError::NotStarted),
            EngineState::Stopped => Err(EngineError::NotRunning(self.state)),
        }
    }

    /// Drops the whole session and returns to `Idle`. Always succeeds.
    pub fn cleanup(&mut self) {
        self.world.clear();
        self.reset_session();
        self.state = EngineState::Idle;
        tracing::debug!(target: "battle::engine", "session cleaned up");
    }

    fn reset_session(&mut self) {
        self.router.clear();
        self.queue.clear();
        self.frame_loop.reset();
        self.follow_ups.clear();
        self.dropped_follow_ups = 0;
        self.resolver = Resolver::new(self.config.health_path.clone());
        self.evaluator = ExpressionEvaluator::new(self.config.eval_cache_capacity);
        self.render.drain();
    }

    fn require_running(&self) -> Result<(), EngineError> {
        match self.state {
            EngineState::Running => Ok(()),
            EngineState::Idle => Err(EngineError::NotStarted),
            state => Err(EngineError::NotRunning(state)),
        }
    }

    fn require_session(&self) -> Result<(), EngineError> {
        match self.state {
            EngineState::Running | EngineState::Paused => Ok(()),
            EngineState::Idle => Err(EngineError::NotStarted),
            state => Err(EngineError::NotRunning(state)),
        }
    }

    // ========================================================================
    // Frame step
    // ========================================================================

    /// Simulates one frame.
    ///
    /// Intent order within the frame: follow-ups from the previous frame,
    /// host intents, then whatever [`World::tick`] produced.
    pub fn step(&mut self) -> Result<FrameReport, EngineError> {
        self.require_running()?;
        let frame = self.frame_loop.advance();
        let health_before = self.health_table();

        let mut intents = std::mem::take(&mut self.follow_ups);
        intents.extend(self.router.drain());
        let output = self.world.tick(frame, &mut self.queue, &mut self.evaluator);
        intents.extend(output.intents);

        let outcome = self.resolver.commit(
            intents,
            self.world.registry_mut(),
            &mut self.evaluator,
            frame,
        );
        let produced =
            self.world
                .route_outputs(outcome.outputs, frame, &mut self.queue, &mut self.evaluator);
        self.push_follow_ups(produced);

        for (member, reaction) in output.reactions.iter().chain(&outcome.reactions) {
            self.render_reaction(*member, reaction, frame);
        }
        self.render_health(frame, &health_before);

        tracing::trace!(
            target: "battle::engine",
            %frame,
            committed = outcome.results.len(),
            follow_ups = self.follow_ups.len(),
            "frame committed"
        );
        Ok(FrameReport {
            frame,
            results: outcome.results,
            follow_ups: self.follow_ups.len(),
        })
    }

    fn push_follow_ups(&mut self, produced: Vec<Intent>) {
        let room = self
            .config
            .max_follow_up_intents
            .saturating_sub(self.follow_ups.len());
        let dropped = produced.len().saturating_sub(room);
        if dropped > 0 {
            self.dropped_follow_ups += dropped as u64;
            tracing::warn!(
                target: "battle::engine",
                dropped,
                limit = self.config.max_follow_up_intents,
                "follow-up intent limit reached"
            );
        }
        self.follow_ups.extend(produced.into_iter().take(room));
    }

    /// Queues a host intent for the next step.
    pub fn process_intent(&mut self, intent: Intent) -> Result<(), EngineError> {
        self.require_running()?;
        self.router.post(intent);
        Ok(())
    }

    // ========================================================================
    // Host operations
    // ========================================================================

    pub fn teleport(&mut self, id: MemberId, position: Vec3) -> Result<(), EngineError> {
        self.require_session()?;
        if !self.world.teleport(id, position) {
            return Err(EngineError::UnknownMember(id));
        }
        let frame = self.frame();
        self.render.emit(id, frame, RenderKind::Teleport { position });
        Ok(())
    }

    pub fn remove_member(&mut self, id: MemberId) -> Result<(), EngineError> {
        self.require_session()?;
        self.world
            .remove_member(id)
            .ok_or(EngineError::UnknownMember(id))?;
        let frame = self.frame();
        self.render.emit(id, frame, RenderKind::Destroy);
        tracing::debug!(target: "battle::engine", member = %id, "member removed");
        Ok(())
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.world.snapshot(self.frame(), &self.queue)
    }

    pub fn members(&self) -> Vec<MemberSummary> {
        self.world.summaries()
    }

    pub fn stats(&self) -> EngineStats {
        let (intents_ok, intents_skipped) = self.resolver.totals();
        EngineStats {
            state: self.state,
            frame: self.frame(),
            members: self.world.registry().len(),
            areas: self.world.areas().len(),
            scheduled_events: self.queue.len(),
            pending_intents: self.router.len() + self.follow_ups.len(),
            intents_ok,
            intents_skipped,
            dropped_follow_ups: self.dropped_follow_ups,
            routed_intents: self.router.routed(),
            elapsed_millis: self.frame_loop.elapsed_millis(),
            cache: self.evaluator.cache_stats(),
        }
    }

    /// Takes the render commands emitted since the last call.
    pub fn drain_render(&mut self) -> Vec<RenderCommand> {
        self.render.drain()
    }

    // ========================================================================
    // Render emission
    // ========================================================================

    fn render_reaction(&mut self, id: MemberId, reaction: &FsmReaction, frame: Frame) {
        match reaction {
            FsmReaction::ActionStarted {
                skill_id, target, ..
            } => {
                let mut kinds = vec![RenderKind::Action {
                    name: skill_id.clone(),
                    phase: "start".to_string(),
                }];
                if let Some(direction) = self.facing(id, *target) {
                    kinds.push(RenderKind::Face { direction });
                }
                if kinds.len() == 1 {
                    self.render.emit(id, frame, kinds.remove(0));
                } else {
                    self.render.emit_batch(id, frame, kinds);
                }
            }
            FsmReaction::Interrupted { skill_id } => {
                let kind = RenderKind::Action {
                    name: skill_id.clone(),
                    phase: "interrupted".to_string(),
                };
                self.render.emit(id, frame, kind);
            }
            _ => {}
        }
    }

    fn facing(&self, id: MemberId, target: Option<MemberId>) -> Option<Vec3> {
        let registry = self.world.registry();
        let from = registry.get(id)?.position();
        let to = registry.get(target?)?.position();
        let direction = (to - from).normalized();
        (direction != Vec3::ZERO).then_some(direction)
    }

    fn health_table(&self) -> BTreeMap<MemberId, f64> {
        self.world
            .registry()
            .ids()
            .iter()
            .filter_map(|id| Some((*id, self.world.health(*id)?)))
            .collect()
    }

    fn health_props(&self, id: MemberId) -> BTreeMap<String, f64> {
        self.world
            .health(id)
            .map(|hp| BTreeMap::from([(self.config.health_path.clone(), hp)]))
            .unwrap_or_default()
    }

    fn render_health(&mut self, frame: Frame, before: &BTreeMap<MemberId, f64>) {
        let ids = self.world.registry().ids().to_vec();
        for id in ids {
            let Some(now) = self.world.health(id) else {
                continue;
            };
            if before.get(&id) != Some(&now) {
                let props = self.health_props(id);
                self.render.emit(id, frame, RenderKind::SetProps { props });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::{FsmEvent, MemberState, SkillDefinition};
    use crate::intent::{IntentPayload, StatMutation};
    use crate::member::{BuffSpec, MemberKind, MemberSpec};
    use crate::pipeline::{Stage, StageEvent, StageKind, StageTarget};
    use crate::render::RenderReconciler;
    use crate::stats::ModifierBucket;

    fn strike() -> Stage {
        Stage::new(
            "strike",
            StageKind::SendEvent {
                target: StageTarget::Target,
                event: StageEvent::Damage {
                    expression: "self.atk - target.def".into(),
                    attack_count: 1,
                    damage_count: 1,
                },
            },
        )
    }

    fn data() -> BattleData {
        BattleData::new()
            .with_skill(
                SkillDefinition::new("slash")
                    .with_frames("2", "0", "0", "1")
                    .with_pipeline("slash"),
            )
            .with_pipeline("slash", vec![strike()])
            .with_member(
                MemberSpec::new(1, "blue", MemberKind::Player)
                    .attribute("atk", 100.0)
                    .attribute("hp.current", 500.0),
            )
            .with_member(
                MemberSpec::new(2, "red", MemberKind::Mob)
                    .at(Vec3::new(3.0, 0.0, 4.0))
                    .attribute("def", 20.0)
                    .attribute("hp.current", 300.0),
            )
    }

    fn started() -> GameEngine {
        let mut engine = GameEngine::new(EngineConfig::default());
        engine.start(&data()).unwrap();
        engine
    }

    fn use_slash() -> Intent {
        Intent::new(
            MemberId(1),
            IntentPayload::SendFsmEvent {
                event: FsmEvent::UseSkill {
                    skill_id: "slash".into(),
                    target: Some(MemberId(2)),
                },
            },
        )
    }

    fn hp(engine: &GameEngine, id: u32) -> Option<f64> {
        engine.world().health(MemberId(id))
    }

    #[test]
    fn lifecycle_violations_are_errors() {
        let mut engine = GameEngine::new(EngineConfig::default());
        assert_eq!(engine.step(), Err(EngineError::NotStarted));
        assert_eq!(engine.stop(), Err(EngineError::NotStarted));
        assert_eq!(engine.resume(), Err(EngineError::NotPaused(EngineState::Idle)));

        engine.start(&data()).unwrap();
        assert_eq!(
            engine.start(&data()),
            Err(EngineError::AlreadyStarted(EngineState::Running))
        );
        assert_eq!(engine.resume(), Err(EngineError::NotPaused(EngineState::Running)));

        engine.pause().unwrap();
        assert_eq!(engine.step(), Err(EngineError::NotRunning(EngineState::Paused)));
        assert_eq!(
            engine.process_intent(use_slash()),
            Err(EngineError::NotRunning(EngineState::Paused))
        );
        engine.resume().unwrap();
        engine.stop().unwrap();
        assert_eq!(engine.step(), Err(EngineError::NotRunning(EngineState::Stopped)));

        engine.cleanup();
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.members().len(), 0);
    }

    #[test]
    fn pause_freezes_the_frame_counter() {
        let mut engine = started();
        engine.step().unwrap();
        engine.step().unwrap();
        engine.pause().unwrap();
        assert_eq!(engine.frame(), Frame(2));
        engine.resume().unwrap();
        assert_eq!(engine.step().unwrap().frame, Frame(2));
    }

    #[test]
    fn skill_pipeline_damages_the_target() {
        let mut engine = started();
        engine.process_intent(use_slash()).unwrap();

        // frame 0 queues, frame 1 starts, the cast closes two frames later
        let mut frames = 0;
        while hp(&engine, 2) == Some(300.0) && frames < 10 {
            engine.step().unwrap();
            frames += 1;
        }
        assert_eq!(hp(&engine, 2), Some(220.0));
        assert_eq!(frames, 4);

        let fsm_state = engine.world().registry().get(MemberId(1)).map(|m| m.fsm().state());
        assert_eq!(fsm_state, Some(MemberState::Recovery));

        let stats = engine.stats();
        assert_eq!(stats.intents_skipped, 0);
        assert_eq!(stats.intents_ok, 2);
        assert_eq!(stats.routed_intents, 1);
        assert!((stats.elapsed_millis - 4.0 * 1000.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn buff_intent_moves_dynamic_total() {
        let mut engine = started();
        let stat = |mutation| {
            Intent::new(
                MemberId(1),
                IntentPayload::ModifyStat {
                    path: "atk".into(),
                    mutation,
                },
            )
        };
        engine
            .process_intent(stat(StatMutation::AddModifier {
                bucket: ModifierBucket::StaticFixed,
                value: 10.0,
                origin: "gear".into(),
            }))
            .unwrap();
        engine
            .process_intent(stat(StatMutation::AddModifier {
                bucket: ModifierBucket::StaticPercentage,
                value: 20.0,
                origin: "gear".into(),
            }))
            .unwrap();
        engine.step().unwrap();

        let atk = |engine: &GameEngine| {
            engine
                .world()
                .registry()
                .get(MemberId(1))
                .and_then(|m| m.stats().get_value("atk"))
        };
        assert_eq!(atk(&engine), Some(130.0));

        let buff = BuffSpec::new("rage").with_modifier("atk", ModifierBucket::DynamicPercentage, 5.0);
        engine
            .process_intent(Intent::new(MemberId(1), IntentPayload::AddBuff { buff }))
            .unwrap();
        engine.step().unwrap();
        assert_eq!(atk(&engine), Some(135.0));
    }

    #[test]
    fn render_commands_follow_the_session() {
        let mut engine = started();
        let spawned = engine.drain_render();
        assert_eq!(spawned.len(), 2);
        assert!(spawned.iter().all(|c| matches!(c.kind, RenderKind::Spawn { .. })));

        engine.process_intent(use_slash()).unwrap();
        for _ in 0..4 {
            engine.step().unwrap();
        }
        let commands = engine.drain_render();
        let started_action = commands.iter().any(|c| {
            c.entity_id == MemberId(1)
                && matches!(&c.kind, RenderKind::Batch { commands } if commands.len() == 2)
        });
        assert!(started_action);
        let health = commands
            .iter()
            .any(|c| c.entity_id == MemberId(2) && matches!(c.kind, RenderKind::SetProps { .. }));
        assert!(health);

        engine.remove_member(MemberId(2)).unwrap();
        let destroyed = engine.drain_render();
        assert!(matches!(destroyed.as_slice(), [RenderCommand { kind: RenderKind::Destroy, .. }]));
        assert_eq!(
            engine.remove_member(MemberId(2)),
            Err(EngineError::UnknownMember(MemberId(2)))
        );
    }

    #[test]
    fn render_sequences_survive_a_restart() {
        let mut engine = started();
        let mut reconciler = RenderReconciler::new();
        assert!(engine.drain_render().iter().all(|c| reconciler.accept(c)));

        engine.stop().unwrap();
        engine.start(&data()).unwrap();
        let respawned = engine.drain_render();
        assert_eq!(respawned.len(), 2);
        assert!(respawned.iter().all(|c| c.seq == 2 && reconciler.accept(c)));

        engine.cleanup();
        assert!(engine.drain_render().is_empty());
        assert_eq!(engine.stats().routed_intents, 0);
    }

    #[test]
    fn follow_up_overflow_is_counted() {
        let config = EngineConfig::default().with_max_follow_up_intents(0);
        let mut engine = GameEngine::new(config);
        let data = data()
            .with_pipeline(
                "chain",
                vec![Stage::new(
                    "again",
                    StageKind::RunPipeline {
                        target: StageTarget::Caster,
                        pipeline: "chain".into(),
                    },
                )],
            );
        engine.start(&data).unwrap();
        engine
            .process_intent(Intent::new(
                MemberId(1),
                IntentPayload::RunPipeline {
                    pipeline: "chain".into(),
                    vars: Default::default(),
                },
            ))
            .unwrap();
        let report = engine.step().unwrap();
        assert_eq!(report.follow_ups, 0);
        assert_eq!(engine.stats().dropped_follow_ups, 1);
    }

    #[test]
    fn identical_sessions_are_identical() {
        let run = || {
            let mut engine = started();
            engine.process_intent(use_slash()).unwrap();
            for _ in 0..12 {
                engine.step().unwrap();
            }
            (engine.snapshot(), engine.drain_render())
        };
        assert_eq!(run(), run());
    }
}
