//! Simulation worker that owns the session's [`GameEngine`].
//!
//! Receives request envelopes from [`RuntimeHandle`], applies them to the
//! engine, and publishes frame, intent and render events to the EventBus.
//! While autoplay is on and the engine runs, a fixed-rate interval advances
//! one frame per tick; missed ticks are delayed, never replayed.
//!
//! [`RuntimeHandle`]: crate::api::RuntimeHandle

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use battle_core::{EngineConfig, EngineState, FrameReport, GameEngine};

use crate::api::{Request, RequestEnvelope, Response, ResponseEnvelope, StepSummary};
use crate::events::{Event, EventBus, FrameEvent, IntentEvent};

/// Commands that can be sent to the simulation worker
pub struct Command {
    pub envelope: RequestEnvelope,
    pub reply: oneshot::Sender<ResponseEnvelope>,
}

/// Background task that processes protocol requests.
pub struct SimulationWorker {
    engine: GameEngine,
    command_rx: mpsc::Receiver<Command>,
    event_bus: EventBus,
    autoplay: bool,
}

impl SimulationWorker {
    pub fn new(
        config: EngineConfig,
        command_rx: mpsc::Receiver<Command>,
        event_bus: EventBus,
        autoplay: bool,
    ) -> Self {
        info!(
            target: "runtime::worker",
            fps = config.fps,
            autoplay,
            "simulation worker initialized"
        );
        Self {
            engine: GameEngine::new(config),
            command_rx,
            event_bus,
            autoplay,
        }
    }

    /// Main worker loop. Ends when every handle is dropped.
    pub async fn run(mut self) {
        let mut ticker = frame_interval(self.engine.config().fps);
        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = ticker.tick(), if self.autoplay_active() => {
                    self.autoplay_frame();
                }
            }
        }
        debug!(target: "runtime::worker", "command channel closed; worker exiting");
    }

    fn autoplay_active(&self) -> bool {
        self.autoplay && self.engine.state() == EngineState::Running
    }

    fn autoplay_frame(&mut self) {
        match self.engine.step() {
            Ok(report) => self.publish_frame(&report),
            Err(err) => warn!(target: "runtime::worker", error = %err, "autoplay step failed"),
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        let Command { envelope, reply } = cmd;
        let kind = envelope.request.name();
        debug!(target: "runtime::worker", id = envelope.id, request = kind, "request received");

        let response = self.dispatch(envelope.request);
        if let Response::Error { code, message } = &response {
            debug!(target: "runtime::worker", id = envelope.id, %code, %message, "request rejected");
        }

        let answer = ResponseEnvelope {
            id: envelope.id,
            response,
        };
        if reply.send(answer).is_err() {
            debug!(target: "runtime::worker", request = kind, "reply channel closed (caller dropped)");
        }
    }

    fn dispatch(&mut self, request: Request) -> Response {
        let result = match request {
            Request::StartSimulation(data) => self.engine.start(&data).map(|()| Response::Ack),
            Request::StopSimulation => self.engine.stop().map(|()| Response::Ack),
            Request::PauseSimulation => self.engine.pause().map(|()| Response::Ack),
            Request::ResumeSimulation => self.engine.resume().map(|()| Response::Ack),
            Request::ProcessIntent(intent) => {
                self.engine.process_intent(*intent).map(|()| Response::Ack)
            }
            Request::GetSnapshot => Ok(Response::Snapshot(Box::new(self.engine.snapshot()))),
            Request::GetStats => Ok(Response::Stats(Box::new(self.engine.stats()))),
            Request::GetMembers => Ok(Response::Members(self.engine.members())),
            Request::Step { frames } => self.step_frames(frames).map(Response::Stepped),
        };

        // Render commands emitted outside a frame (spawn, reconcile).
        self.publish_render();
        result.unwrap_or_else(Response::from)
    }

    fn step_frames(&mut self, frames: u32) -> Result<StepSummary, battle_core::EngineError> {
        let mut summary = StepSummary {
            frame: self.engine.frame(),
            ..StepSummary::default()
        };
        for _ in 0..frames {
            let report = self.engine.step()?;
            summary.frame = report.frame;
            summary.frames += 1;
            summary.committed += report.results.len();
            summary.skipped += report.results.len() - report.ok_count();
            self.publish_frame(&report);
        }
        Ok(summary)
    }

    fn publish_frame(&mut self, report: &FrameReport) {
        for result in &report.results {
            self.event_bus.publish(Event::Intent(IntentEvent {
                frame: report.frame,
                result: result.clone(),
            }));
        }
        self.publish_render();
        self.event_bus.publish(Event::Frame(FrameEvent {
            frame: report.frame,
            committed: report.results.len(),
            skipped: report.results.len() - report.ok_count(),
            follow_ups: report.follow_ups,
            state: self.engine.state(),
        }));
    }

    fn publish_render(&mut self) {
        for command in self.engine.drain_render() {
            self.event_bus.publish(Event::Render(command));
        }
    }
}

fn frame_interval(fps: u32) -> Interval {
    let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
