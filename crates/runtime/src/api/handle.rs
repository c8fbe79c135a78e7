//! Cloneable façade for issuing requests to the runtime.
//!
//! [`RuntimeHandle`] hides channel plumbing and correlation ids, and offers
//! async helpers for every protocol request plus topic subscriptions.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, mpsc, oneshot};

use battle_core::{BattleData, EngineStats, Intent, MemberSummary, WorldSnapshot};

use super::errors::{Result, RuntimeError};
use super::protocol::{Request, RequestEnvelope, Response, ResponseEnvelope, StepSummary};
use crate::events::{Event, EventBus, Topic};
use crate::workers::Command;

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
    next_id: Arc<AtomicU64>,
}

impl RuntimeHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Sends a raw envelope and returns the worker's answer unchanged.
    pub async fn send(&self, envelope: RequestEnvelope) -> Result<ResponseEnvelope> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(Command {
                envelope,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Sends `request` under a fresh correlation id and unwraps engine
    /// errors into [`RuntimeError::Engine`].
    pub async fn request(&self, request: Request) -> Result<Response> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let answer = self.send(RequestEnvelope { id, request }).await?;
        if answer.id != id {
            return Err(RuntimeError::CorrelationMismatch {
                expected: id,
                got: answer.id,
            });
        }
        match answer.response {
            Response::Error { code, message } => Err(RuntimeError::Engine { code, message }),
            response => Ok(response),
        }
    }

    async fn ack(&self, request: Request) -> Result<()> {
        let name = request.name();
        match self.request(request).await? {
            Response::Ack => Ok(()),
            other => Err(unexpected(name, &other)),
        }
    }

    pub async fn start(&self, data: BattleData) -> Result<()> {
        self.ack(Request::StartSimulation(Box::new(data))).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.ack(Request::StopSimulation).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.ack(Request::PauseSimulation).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.ack(Request::ResumeSimulation).await
    }

    /// Queues an intent for the next simulated frame.
    pub async fn process_intent(&self, intent: Intent) -> Result<()> {
        self.ack(Request::ProcessIntent(Box::new(intent))).await
    }

    /// Advances `frames` frames right away.
    pub async fn step(&self, frames: u32) -> Result<StepSummary> {
        match self.request(Request::Step { frames }).await? {
            Response::Stepped(summary) => Ok(summary),
            other => Err(unexpected("step", &other)),
        }
    }

    pub async fn snapshot(&self) -> Result<WorldSnapshot> {
        match self.request(Request::GetSnapshot).await? {
            Response::Snapshot(snapshot) => Ok(*snapshot),
            other => Err(unexpected("getSnapshot", &other)),
        }
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        match self.request(Request::GetStats).await? {
            Response::Stats(stats) => Ok(*stats),
            other => Err(unexpected("getStats", &other)),
        }
    }

    pub async fn members(&self) -> Result<Vec<MemberSummary>> {
        match self.request(Request::GetMembers).await? {
            Response::Members(members) => Ok(members),
            other => Err(unexpected("getMembers", &other)),
        }
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Frame` - One event per simulated frame
    /// - `Topic::Render` - Render commands for the presentation layer
    /// - `Topic::Intent` - Commit result of every intent
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> std::collections::HashMap<Topic, broadcast::Receiver<Event>> {
        self.event_bus.subscribe_multiple(topics)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

fn unexpected(request: &'static str, got: &Response) -> RuntimeError {
    RuntimeError::UnexpectedResponse {
        request,
        got: got.name(),
    }
}
