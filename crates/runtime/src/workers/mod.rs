//! Worker tasks that back the runtime orchestration.
//!
//! The simulation worker owns the engine and serves protocol requests.

mod simulation;

pub use simulation::{Command, SimulationWorker};
