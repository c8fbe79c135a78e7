//! Applies a frame's intents to the world.
//!
//! Intents are applied one at a time in production order. A failing intent
//! is recorded as skipped and the batch carries on. Whatever the applied
//! intents produce (pipeline outputs, FSM reactions) is handed back to the
//! caller as follow-up work for the next frame.

use super::error::IntentError;
use super::{Intent, IntentExecResult, IntentPayload, IntentStatus, StatMutation};
use crate::expr::{EvalContext, ExpressionEvaluator, Value};
use crate::fsm::{DamageRequest, FsmEvent, FsmReaction};
use crate::member::{Member, MemberRegistry};
use crate::pipeline::ActionOutput;
use crate::types::{Frame, MemberId};

/// Everything one [`Resolver::commit`] produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommitOutcome {
    pub results: Vec<IntentExecResult>,
    /// Pipeline outputs; never re-enter the batch that produced them.
    pub outputs: Vec<ActionOutput>,
    /// FSM reactions to delivered events, per member.
    pub reactions: Vec<(MemberId, FsmReaction)>,
}

impl CommitOutcome {
    pub fn ok_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.results.len() - self.ok_count()
    }
}

#[derive(Clone, Debug)]
pub struct Resolver {
    health_path: String,
    ok_total: u64,
    skipped_total: u64,
}

impl Resolver {
    pub fn new(health_path: impl Into<String>) -> Self {
        Self {
            health_path: health_path.into(),
            ok_total: 0,
            skipped_total: 0,
        }
    }

    /// Totals across every commit so far: `(ok, skipped)`.
    pub fn totals(&self) -> (u64, u64) {
        (self.ok_total, self.skipped_total)
    }

    pub fn commit(
        &mut self,
        intents: Vec<Intent>,
        registry: &mut MemberRegistry,
        evaluator: &mut ExpressionEvaluator,
        frame: Frame,
    ) -> CommitOutcome {
        let mut outcome = CommitOutcome::default();

        for (index, intent) in intents.into_iter().enumerate() {
            let kind = intent.kind();
            let actor_id = intent.actor_id;
            let subject = intent.subject();

            let status = match self.apply(intent, registry, evaluator, frame, &mut outcome) {
                Ok(()) => {
                    self.ok_total += 1;
                    IntentStatus::Ok
                }
                Err(err) => {
                    self.skipped_total += 1;
                    tracing::debug!(
                        target: "battle::resolver",
                        %frame,
                        index,
                        kind,
                        member = %subject,
                        error = %err,
                        "intent skipped"
                    );
                    IntentStatus::Skipped {
                        reason: err.to_string(),
                    }
                }
            };
            outcome.results.push(IntentExecResult {
                index,
                kind: kind.to_string(),
                actor_id,
                status,
            });
        }

        tracing::trace!(
            target: "battle::resolver",
            %frame,
            ok = outcome.ok_count(),
            skipped = outcome.skipped_count(),
            "commit finished"
        );
        outcome
    }

    fn apply(
        &self,
        intent: Intent,
        registry: &mut MemberRegistry,
        evaluator: &mut ExpressionEvaluator,
        frame: Frame,
        outcome: &mut CommitOutcome,
    ) -> Result<(), IntentError> {
        let subject = intent.subject();
        match intent.payload {
            IntentPayload::SendFsmEvent { event } => {
                if let FsmEvent::TakeDamage(request) = &event {
                    self.apply_damage(subject, request, registry, evaluator)?;
                }
                let reactions = member_mut(registry, subject)?.fsm_mut().handle(&event);
                outcome
                    .reactions
                    .extend(reactions.into_iter().map(|r| (subject, r)));
            }
            IntentPayload::RunPipeline { pipeline, vars } => {
                let outputs = registry.run_pipeline(subject, &pipeline, evaluator, frame, |ctx| {
                    ctx.vars.extend(vars);
                })?;
                outcome.outputs.extend(outputs);
            }
            IntentPayload::AddBuff { buff } => {
                let buff_id = buff.id.clone();
                let member = member_mut(registry, subject)?;
                for err in member.apply_buff(buff, frame, &intent.source) {
                    tracing::warn!(
                        target: "battle::resolver",
                        member = %subject,
                        buff = %buff_id,
                        error = %err,
                        "buff part not applied"
                    );
                }
            }
            IntentPayload::RemoveBuff { buff_id, granted_by } => {
                let member = member_mut(registry, subject)?;
                let held_elsewhere = granted_by.as_deref().is_some_and(|source| {
                    member
                        .buffs()
                        .get(&buff_id)
                        .is_some_and(|active| active.source != source)
                });
                if held_elsewhere {
                    tracing::debug!(
                        target: "battle::resolver",
                        member = %subject,
                        buff = %buff_id,
                        "buff re-granted by another source; kept"
                    );
                } else if !member.remove_buff(&buff_id) {
                    return Err(IntentError::BuffNotActive(buff_id));
                }
            }
            IntentPayload::ModifyStat { path, mutation } => {
                let stats = member_mut(registry, subject)?.stats_mut();
                match mutation {
                    StatMutation::AddBase { value } => {
                        stats.add_base(&path, value)?;
                    }
                    StatMutation::SetBase { value } => stats.set_base(&path, value)?,
                    StatMutation::AddModifier {
                        bucket,
                        value,
                        origin,
                    } => stats.add_modifier(&path, bucket, value, origin)?,
                    StatMutation::RemoveModifiersByOrigin { origin } => {
                        stats.remove_modifiers_by_origin(&origin);
                    }
                }
            }
            IntentPayload::InsertPipelineStage {
                pipeline,
                after_stage,
                stage,
                priority,
            } => {
                member_mut(registry, subject)?.pipelines_mut().insert_stage(
                    &pipeline,
                    &after_stage,
                    stage,
                    intent.source.clone(),
                    priority,
                )?;
            }
            IntentPayload::RemovePipelineStagesBySource { stage_source } => {
                member_mut(registry, subject)?
                    .pipelines_mut()
                    .remove_stages_by_source(&stage_source);
            }
        }
        Ok(())
    }

    /// Evaluates a damage request against `subject` and subtracts it from
    /// the health attribute.
    ///
    /// The expression sees the attacker as `self` and the victim as
    /// `target`. Members without a health attribute take no damage.
    fn apply_damage(
        &self,
        subject: MemberId,
        request: &DamageRequest,
        registry: &mut MemberRegistry,
        evaluator: &mut ExpressionEvaluator,
    ) -> Result<(), IntentError> {
        if !registry.get(subject).is_some_and(|m| m.stats().contains(&self.health_path)) {
            if registry.get(subject).is_none() {
                return Err(IntentError::MemberNotFound(subject));
            }
            tracing::debug!(
                target: "battle::resolver",
                member = %subject,
                path = %self.health_path,
                "member has no health attribute; damage ignored"
            );
            return Ok(());
        }

        let mut locals = request.vars.clone();
        locals.insert("attackCount".into(), Value::Number(request.attack_count.into()));
        locals.insert("damageCount".into(), Value::Number(request.damage_count.into()));
        let per_hit = {
            let ctx = EvalContext::new(request.source, &*registry)
                .with_target(Some(subject))
                .with_locals(&locals);
            evaluator.evaluate_number_or_zero(&request.expression, &ctx)
        };
        let total = (per_hit * f64::from(request.damage_count)).max(0.0);

        let remaining = member_mut(registry, subject)?
            .stats_mut()
            .add_base(&self.health_path, -total)?;
        tracing::debug!(
            target: "battle::resolver",
            member = %subject,
            attacker = %request.source,
            damage = total,
            remaining,
            "damage applied"
        );
        Ok(())
    }
}

fn member_mut(registry: &mut MemberRegistry, id: MemberId) -> Result<&mut Member, IntentError> {
    registry.get_mut(id).ok_or(IntentError::MemberNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::MemberState;
    use crate::member::{BuffSpec, MemberKind, MemberSpec};
    use crate::pipeline::{Stage, StageKind, StageTarget, StatOp};
    use crate::stats::ModifierBucket;

    struct Fixture {
        registry: MemberRegistry,
        evaluator: ExpressionEvaluator,
        resolver: Resolver,
    }

    impl Fixture {
        fn new() -> Self {
            let mut registry = MemberRegistry::new();
            let set_var = Stage::new(
                "compute",
                StageKind::SetVar {
                    name: "bonus".into(),
                    value: "self.atk / 10 + boost".into(),
                },
            );
            let spend = Stage::new(
                "spend",
                StageKind::ModifyStat {
                    target: StageTarget::Caster,
                    path: "mp".into(),
                    op: StatOp::AddBase,
                    value: Some("-5".into()),
                    bucket: None,
                    origin: None,
                },
            );
            registry.insert_spec(
                &MemberSpec::new(1, "blue", MemberKind::Player)
                    .attribute("atk", 100.0)
                    .attribute("mp", 50.0)
                    .attribute("hp.current", 500.0)
                    .pipeline("empower", vec![set_var, spend]),
            );
            registry.insert_spec(
                &MemberSpec::new(2, "red", MemberKind::Mob)
                    .attribute("def", 20.0)
                    .attribute("hp.current", 300.0),
            );
            Self {
                registry,
                evaluator: ExpressionEvaluator::new(64),
                resolver: Resolver::new("hp.current"),
            }
        }

        fn commit(&mut self, intents: Vec<Intent>) -> CommitOutcome {
            self.resolver
                .commit(intents, &mut self.registry, &mut self.evaluator, Frame(1))
        }

        fn stat(&self, id: u32, path: &str) -> Option<f64> {
            self.registry.get(MemberId(id))?.stats().get_value(path)
        }
    }

    fn damage(expression: &str, damage_count: u32) -> Intent {
        let mut request = DamageRequest::new(MemberId(1), expression);
        request.damage_count = damage_count;
        Intent::new(
            MemberId(1),
            IntentPayload::SendFsmEvent {
                event: FsmEvent::TakeDamage(request),
            },
        )
        .with_target(Some(MemberId(2)))
    }

    #[test]
    fn failures_do_not_abort_the_batch() {
        let mut fx = Fixture::new();
        let intents = vec![
            Intent::new(
                MemberId(99),
                IntentPayload::RemoveBuff {
                    buff_id: "x".into(),
                    granted_by: None,
                },
            ),
            Intent::new(
                MemberId(1),
                IntentPayload::ModifyStat {
                    path: "nope".into(),
                    mutation: StatMutation::AddBase { value: 1.0 },
                },
            ),
            Intent::new(
                MemberId(1),
                IntentPayload::ModifyStat {
                    path: "atk".into(),
                    mutation: StatMutation::AddBase { value: 5.0 },
                },
            ),
        ];
        let outcome = fx.commit(intents);
        let statuses: Vec<bool> = outcome.results.iter().map(|r| r.is_ok()).collect();
        assert_eq!(statuses, vec![false, false, true]);
        assert_eq!(outcome.results[0].index, 0);
        assert_eq!(outcome.results[1].kind, "modifyStat");
        assert_eq!(fx.stat(1, "atk"), Some(105.0));
        assert_eq!(fx.resolver.totals(), (1, 2));
    }

    #[test]
    fn damage_uses_attacker_and_victim_stats() {
        let mut fx = Fixture::new();
        let outcome = fx.commit(vec![damage("self.atk - target.def", 2)]);
        assert!(outcome.results[0].is_ok());
        assert_eq!(fx.stat(2, "hp.current"), Some(300.0 - 160.0));
    }

    #[test]
    fn failing_damage_expression_deals_nothing() {
        let mut fx = Fixture::new();
        let outcome = fx.commit(vec![damage("self.missing * 2", 1), damage("-40", 1)]);
        assert!(outcome.results.iter().all(|r| r.is_ok()));
        assert_eq!(fx.stat(2, "hp.current"), Some(300.0));
    }

    #[test]
    fn run_pipeline_merges_context_back() {
        let mut fx = Fixture::new();
        let mut vars = crate::expr::Locals::new();
        vars.insert("boost".into(), Value::Number(3.0));
        let outcome = fx.commit(vec![Intent::new(
            MemberId(1),
            IntentPayload::RunPipeline {
                pipeline: "empower".into(),
                vars,
            },
        )]);
        assert!(outcome.results[0].is_ok());
        let live = fx.registry.get(MemberId(1)).map(|m| m.context().clone());
        assert_eq!(
            live.as_ref().and_then(|c| c.var("bonus")),
            Some(&Value::Number(13.0))
        );
        assert_eq!(outcome.outputs.len(), 1);
        assert_eq!(fx.stat(1, "mp"), Some(50.0));
    }

    #[test]
    fn buffs_and_stage_edits() {
        let mut fx = Fixture::new();
        let buff = BuffSpec::new("rage").with_modifier("atk", ModifierBucket::DynamicPercentage, 50.0);
        let outcome = fx.commit(vec![
            Intent::new(MemberId(1), IntentPayload::AddBuff { buff }),
            Intent::new(
                MemberId(1),
                IntentPayload::InsertPipelineStage {
                    pipeline: "empower".into(),
                    after_stage: "compute".into(),
                    stage: Stage::new("echo", StageKind::Log { message: "echo".into() }),
                    priority: 0,
                },
            )
            .with_source("buff:rage"),
        ]);
        assert_eq!(outcome.ok_count(), 2);
        assert_eq!(fx.stat(1, "atk"), Some(150.0));
        let ids = |fx: &Fixture| {
            fx.registry
                .get(MemberId(1))
                .map(|m| m.pipelines().stage_ids("empower").join(","))
        };
        assert_eq!(ids(&fx).as_deref(), Some("compute,echo,spend"));

        let outcome = fx.commit(vec![
            Intent::new(
                MemberId(1),
                IntentPayload::RemovePipelineStagesBySource {
                    stage_source: "buff:rage".into(),
                },
            ),
            Intent::new(
                MemberId(1),
                IntentPayload::RemoveBuff {
                    buff_id: "rage".into(),
                    granted_by: None,
                },
            ),
            Intent::new(
                MemberId(1),
                IntentPayload::RemoveBuff {
                    buff_id: "rage".into(),
                    granted_by: None,
                },
            ),
        ]);
        assert_eq!(outcome.skipped_count(), 1);
        assert_eq!(fx.stat(1, "atk"), Some(100.0));
        assert_eq!(ids(&fx).as_deref(), Some("compute,spend"));
    }

    #[test]
    fn scoped_removal_spares_other_grants() {
        let mut fx = Fixture::new();
        let buff = BuffSpec::new("rage").with_modifier("atk", ModifierBucket::DynamicPercentage, 50.0);
        let remove = |granted_by: &str| {
            Intent::new(
                MemberId(1),
                IntentPayload::RemoveBuff {
                    buff_id: "rage".into(),
                    granted_by: Some(granted_by.into()),
                },
            )
        };
        let outcome = fx.commit(vec![
            Intent::new(MemberId(1), IntentPayload::AddBuff { buff }).with_source("skill:roar"),
            remove("area:aura"),
        ]);
        assert_eq!(outcome.ok_count(), 2);
        assert_eq!(fx.stat(1, "atk"), Some(150.0));

        let outcome = fx.commit(vec![remove("skill:roar")]);
        assert_eq!(outcome.ok_count(), 1);
        assert_eq!(fx.stat(1, "atk"), Some(100.0));
    }

    #[test]
    fn events_reach_the_fsm() {
        let mut fx = Fixture::new();
        fx.commit(vec![Intent::new(
            MemberId(2),
            IntentPayload::SendFsmEvent {
                event: FsmEvent::UseSkill {
                    skill_id: "bite".into(),
                    target: Some(MemberId(1)),
                },
            },
        )]);
        let fsm = fx.registry.get(MemberId(2)).map(|m| m.fsm().clone());
        assert_eq!(fsm.as_ref().map(|f| f.queued().count()), Some(1));
        assert_eq!(fsm.map(|f| f.state()), Some(MemberState::Free));
    }
}
