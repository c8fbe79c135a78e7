//! Skill and buff effect pipelines.
//!
//! A pipeline is an ordered list of named [`Stage`]s. Buffs splice extra
//! stages in after an anchor and retract them by source when they end, so a
//! skill's static definition is never edited.
mod context;
mod error;
mod execute;
mod manager;
mod stage;

pub use context::{ActionOutput, PipelineContext, PipelineRun};
pub use error::PipelineError;
pub use execute::PipelineEnv;
pub use manager::PipelineManager;
pub use stage::{Stage, StageEvent, StageKind, StageTarget, StatOp};
