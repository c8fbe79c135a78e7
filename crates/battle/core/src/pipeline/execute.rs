//! Linear pipeline execution.
//!
//! Stages run in list order against one context. Each stage may update the
//! context and append [`ActionOutput`]s; nothing outside the context is
//! mutated here. The first failing stage aborts the run.

use super::context::{ActionOutput, PipelineContext, PipelineRun};
use super::error::PipelineError;
use super::manager::PipelineManager;
use super::stage::{Stage, StageEvent, StageKind, StageTarget, StatOp};
use crate::area::SpawnOrigin;
use crate::expr::{EvalContext, ExpressionEvaluator};
use crate::fsm::{DamageRequest, FsmEvent};
use crate::intent::{Intent, IntentPayload, StatMutation};
use crate::member::MemberView;
use crate::types::{Frame, MemberId};

/// Read-only world access plus the shared evaluator.
pub struct PipelineEnv<'a> {
    pub frame: Frame,
    pub world: &'a dyn MemberView,
    pub evaluator: &'a mut ExpressionEvaluator,
}

impl PipelineManager {
    /// Runs `pipeline` over `ctx` and returns the updated context with the
    /// outputs collected along the way.
    pub fn run(
        &self,
        pipeline: &str,
        mut ctx: PipelineContext,
        env: &mut PipelineEnv<'_>,
    ) -> Result<PipelineRun, PipelineError> {
        let stages = self
            .stages(pipeline)
            .ok_or_else(|| PipelineError::UnknownPipeline(pipeline.to_string()))?;

        let source = match &ctx.skill_id {
            Some(skill) => format!("skill:{skill}"),
            None => format!("pipeline:{pipeline}"),
        };

        let mut outputs = Vec::new();
        for stage in stages {
            if let Some(condition) = &stage.when {
                let eval_ctx = eval_context(&ctx, env.world);
                if !env.evaluator.evaluate_bool_or_false(condition, &eval_ctx) {
                    tracing::trace!(
                        target: "battle::pipeline",
                        pipeline,
                        stage = %stage.id,
                        "stage guard is false; skipping"
                    );
                    continue;
                }
            }
            execute_stage(stage, &stage.kind, &source, &mut ctx, env, &mut outputs)?;
        }

        Ok(PipelineRun { ctx, outputs })
    }
}

fn eval_context<'a>(ctx: &'a PipelineContext, world: &'a dyn MemberView) -> EvalContext<'a> {
    EvalContext::new(ctx.caster, world.stats())
        .with_target(ctx.target)
        .with_locals(&ctx.vars)
}

fn eval(expression: &str, ctx: &PipelineContext, env: &mut PipelineEnv<'_>) -> f64 {
    let eval_ctx = eval_context(ctx, env.world);
    env.evaluator.evaluate_number_or_zero(expression, &eval_ctx)
}

fn subject(
    stage: &Stage,
    target: StageTarget,
    ctx: &PipelineContext,
) -> Result<MemberId, PipelineError> {
    match target {
        StageTarget::Caster => Ok(ctx.caster),
        StageTarget::Target => ctx.target.ok_or_else(|| PipelineError::MissingTarget {
            stage: stage.id.clone(),
        }),
    }
}

fn invalid(stage: &Stage, reason: &str) -> PipelineError {
    PipelineError::InvalidStage {
        stage: stage.id.clone(),
        reason: reason.to_string(),
    }
}

fn execute_stage(
    stage: &Stage,
    kind: &StageKind,
    source: &str,
    ctx: &mut PipelineContext,
    env: &mut PipelineEnv<'_>,
    outputs: &mut Vec<ActionOutput>,
) -> Result<(), PipelineError> {
    let caster = ctx.caster;
    let intent = |subject: MemberId, payload: IntentPayload| -> Intent {
        Intent::new(caster, payload)
            .with_target(Some(subject))
            .with_source(source)
    };

    match kind {
        StageKind::SetVar { name, value } => {
            let value = eval(value, ctx, env);
            ctx.set_var(name.clone(), value);
        }
        StageKind::ModifyStat {
            target,
            path,
            op,
            value,
            bucket,
            origin,
        } => {
            let who = subject(stage, *target, ctx)?;
            let mut amount = || -> Result<f64, PipelineError> {
                let expression = value
                    .as_deref()
                    .ok_or_else(|| invalid(stage, "missing `value`"))?;
                Ok(eval(expression, ctx, env))
            };
            let mutation = match op {
                StatOp::AddBase => StatMutation::AddBase { value: amount()? },
                StatOp::SetBase => StatMutation::SetBase { value: amount()? },
                StatOp::AddModifier => StatMutation::AddModifier {
                    bucket: bucket.ok_or_else(|| invalid(stage, "missing `bucket`"))?,
                    value: amount()?,
                    origin: origin.clone().unwrap_or_else(|| source.to_string()),
                },
                StatOp::RemoveModifiersByOrigin => StatMutation::RemoveModifiersByOrigin {
                    origin: origin.clone().unwrap_or_else(|| source.to_string()),
                },
            };
            outputs.push(ActionOutput::Intent(intent(
                who,
                IntentPayload::ModifyStat {
                    path: path.clone(),
                    mutation,
                },
            )));
        }
        StageKind::ApplyBuff { target, buff } => {
            let who = subject(stage, *target, ctx)?;
            outputs.push(ActionOutput::Intent(intent(
                who,
                IntentPayload::AddBuff { buff: buff.clone() },
            )));
        }
        StageKind::RemoveBuff { target, buff_id } => {
            let who = subject(stage, *target, ctx)?;
            outputs.push(ActionOutput::Intent(intent(
                who,
                IntentPayload::RemoveBuff {
                    buff_id: buff_id.clone(),
                    granted_by: None,
                },
            )));
        }
        StageKind::SendEvent { target, event } => {
            let who = subject(stage, *target, ctx)?;
            let event = match event {
                StageEvent::Damage {
                    expression,
                    attack_count,
                    damage_count,
                } => FsmEvent::TakeDamage(DamageRequest {
                    source: ctx.caster,
                    expression: expression.clone(),
                    attack_count: *attack_count,
                    damage_count: *damage_count,
                    vars: ctx.vars.clone(),
                }),
                StageEvent::UseSkill { skill_id } => FsmEvent::UseSkill {
                    skill_id: skill_id.clone(),
                    target: ctx.target,
                },
                StageEvent::Interrupt => FsmEvent::Interrupt,
                StageEvent::ClearQueue => FsmEvent::ClearQueue,
            };
            outputs.push(ActionOutput::Intent(intent(
                who,
                IntentPayload::SendFsmEvent { event },
            )));
        }
        StageKind::RunPipeline { target, pipeline } => {
            let who = subject(stage, *target, ctx)?;
            outputs.push(ActionOutput::Intent(intent(
                who,
                IntentPayload::RunPipeline {
                    pipeline: pipeline.clone(),
                    vars: ctx.vars.clone(),
                },
            )));
        }
        StageKind::SpawnDamageArea(spec) => {
            let origin = spawn_origin(stage, source, ctx, env)?;
            outputs.push(ActionOutput::SpawnArea(spec.to_request(&origin)));
        }
        StageKind::SpawnBuffArea(spec) => {
            let origin = spawn_origin(stage, source, ctx, env)?;
            outputs.push(ActionOutput::SpawnArea(spec.to_request(&origin)));
        }
        StageKind::SpawnTrapArea(spec) => {
            let origin = spawn_origin(stage, source, ctx, env)?;
            outputs.push(ActionOutput::SpawnArea(spec.to_request(&origin)));
        }
        StageKind::Schedule {
            delay_frames,
            priority,
            then,
        } => {
            let mut inner = Vec::new();
            execute_stage(stage, then, source, ctx, env, &mut inner)?;
            for output in inner {
                match output {
                    ActionOutput::Intent(intent) => outputs.push(ActionOutput::Schedule {
                        delay_frames: *delay_frames,
                        priority: *priority,
                        intent,
                    }),
                    _ => return Err(invalid(stage, "schedule can only delay intents")),
                }
            }
        }
        StageKind::Log { message } => {
            tracing::info!(
                target: "battle::pipeline",
                member = %ctx.caster,
                stage = %stage.id,
                "{message}"
            );
        }
    }
    Ok(())
}

fn spawn_origin(
    stage: &Stage,
    source: &str,
    ctx: &PipelineContext,
    env: &PipelineEnv<'_>,
) -> Result<SpawnOrigin, PipelineError> {
    let world = env.world;
    let (Some(camp), Some(position)) = (world.camp(ctx.caster), world.position(ctx.caster)) else {
        return Err(invalid(stage, "caster is not in the world"));
    };
    Ok(SpawnOrigin {
        caster: ctx.caster,
        camp: camp.clone(),
        caster_position: position,
        target: ctx.target,
        target_position: ctx.target.and_then(|t| world.position(t)),
        frame: env.frame,
        source: source.to_string(),
        vars: ctx.vars.clone(),
    })
}
