//! Deterministic, frame-driven battle simulation.
//!
//! `battle-core` holds the canonical combat rules: the expression language,
//! attribute containers, member state machines, pipelines, areas and the
//! intent resolver. It performs no I/O and owns no threads; hosts such as
//! `battle-runtime` drive it one frame at a time. All state mutation flows
//! through [`engine::GameEngine`], and supporting crates depend on the types
//! re-exported here.
pub mod area;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod event_queue;
pub mod expr;
pub mod fsm;
pub mod intent;
pub mod member;
pub mod pipeline;
pub mod render;
pub mod stats;
pub mod types;
pub mod world;

pub use area::{
    AreaAffects, AreaAnchor, AreaId, AreaManager, AreaRequest, AreaSummary, BuffAreaSpec,
    DamageAreaSpec, RangeKind, SpatialGrid, TrapAreaSpec,
};
pub use config::EngineConfig;
pub use data::{BattleData, DataError};
pub use engine::{EngineError, EngineState, EngineStats, FrameReport, GameEngine};
pub use error::{ErrorSeverity, SimError};
pub use event_queue::{EventQueue, ScheduledEvent};
pub use expr::{
    AccessorRoot, CacheStats, CompileError, EvalError, ExpressionEvaluator, NestedSchema, Value,
};
pub use fsm::{
    DamageRequest, FsmError, FsmEvent, FsmReaction, MemberFsm, MemberState, SkillDefinition,
    SkillTiming,
};
pub use intent::{
    Intent, IntentError, IntentExecResult, IntentPayload, IntentStatus, Resolver, StatMutation,
};
pub use member::{BuffSpec, Camp, Member, MemberKind, MemberRegistry, MemberSpec};
pub use pipeline::{PipelineError, Stage, StageEvent, StageKind, StageTarget, StatOp};
pub use render::{RenderCommand, RenderEmitter, RenderKind, RenderReconciler};
pub use stats::{ModifierBucket, StatContainer, StatError};
pub use types::{Frame, MemberId, Vec3};
pub use world::{MemberSnapshot, MemberSummary, World, WorldSnapshot};
