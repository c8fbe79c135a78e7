//! Runtime orchestration for the battle simulation.
//!
//! This crate moves a [`battle_core::GameEngine`] into a dedicated worker
//! task and exposes it through a correlation-id request protocol. Consumers
//! embed [`Runtime`] to own the worker, talk to it through the cloneable
//! [`RuntimeHandle`], and subscribe to frame, render and intent events.
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`config`] reads runtime settings from the environment
//! - [`api`] exposes the request protocol and client handle
//! - [`events`] provides the topic-based event bus
//! - [`utils`] holds snapshot hashing helpers
//! - `workers` keeps the simulation task internal to the crate
pub mod api;
pub mod config;
pub mod events;
pub mod runtime;
pub mod utils;

mod workers;

pub use api::{
    Request, RequestEnvelope, RequestId, Response, ResponseEnvelope, Result, RuntimeError,
    RuntimeHandle, StepSummary,
};
pub use config::RuntimeConfig;
pub use events::{Event, EventBus, FrameEvent, IntentEvent, Topic};
pub use runtime::{Runtime, RuntimeBuilder};
pub use utils::hash::snapshot_digest;
