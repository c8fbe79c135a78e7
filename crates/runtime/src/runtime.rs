//! High-level runtime orchestrator.
//!
//! The runtime owns the simulation worker, wires up command/event channels,
//! and exposes a builder-based API for clients to drive the simulation.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::api::{Result, RuntimeError, RuntimeHandle};
use crate::config::RuntimeConfig;
use crate::events::{Event, EventBus, Topic};
use crate::workers::SimulationWorker;

/// Main runtime that hosts one battle session in a worker task
///
/// [`RuntimeHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    handle: RuntimeHandle,
    sim_worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Spawns the worker with `config`. Must be called inside a tokio runtime.
    pub fn start(config: RuntimeConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Get a cloneable handle to this runtime
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.handle.subscribe(topic)
    }

    /// Shutdown the runtime gracefully
    ///
    /// The worker exits once every clone of the handle has been dropped.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);
        self.sim_worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    event_bus: Option<EventBus>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            event_bus: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish to an existing bus instead of creating one.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn autoplay(mut self, autoplay: bool) -> Self {
        self.config.autoplay = autoplay;
        self
    }

    pub fn build(self) -> Runtime {
        let RuntimeConfig {
            engine,
            command_buffer_size,
            event_buffer_size,
            autoplay,
        } = self.config;

        let event_bus = self
            .event_bus
            .unwrap_or_else(|| EventBus::with_capacity(event_buffer_size));
        let (command_tx, command_rx) = mpsc::channel(command_buffer_size.max(1));

        let worker = SimulationWorker::new(engine, command_rx, event_bus.clone(), autoplay);
        let sim_worker_handle = tokio::spawn(worker.run());
        tracing::info!(target: "runtime::worker", "simulation worker spawned");

        Runtime {
            handle: RuntimeHandle::new(command_tx, event_bus),
            sim_worker_handle,
        }
    }
}
