//! Member finite-state machine.
//!
//! `Free → Startup → {Chanting | Charging | Channeling} → Recovery → Free`,
//! driven by a frame clock rather than stored transitions.
mod error;
mod event;
mod machine;
mod skill;
mod state;

pub use error::FsmError;
pub use event::{DamageRequest, FsmEvent, FsmReaction};
pub use machine::{ActionPlan, MemberFsm, QueuedSkill};
pub use skill::{SkillBook, SkillDefinition};
pub use state::{MemberState, SkillTiming, derive_state};
