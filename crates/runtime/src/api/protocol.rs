//! Worker request protocol.
//!
//! Every request travels in a [`RequestEnvelope`] and is answered by exactly
//! one [`ResponseEnvelope`] carrying the same `id`. Both sides are plain
//! serde types, so a host can also speak the protocol as JSON.

use battle_core::{
    BattleData, EngineError, EngineStats, Frame, Intent, MemberSummary, SimError, WorldSnapshot,
};
use serde::{Deserialize, Serialize};

/// Correlation id chosen by the sender.
pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Request {
    StartSimulation(Box<BattleData>),
    StopSimulation,
    PauseSimulation,
    ResumeSimulation,
    ProcessIntent(Box<Intent>),
    GetSnapshot,
    GetStats,
    GetMembers,
    /// Advances `frames` frames immediately, independent of autoplay.
    Step { frames: u32 },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::StartSimulation(_) => "startSimulation",
            Request::StopSimulation => "stopSimulation",
            Request::PauseSimulation => "pauseSimulation",
            Request::ResumeSimulation => "resumeSimulation",
            Request::ProcessIntent(_) => "processIntent",
            Request::GetSnapshot => "getSnapshot",
            Request::GetStats => "getStats",
            Request::GetMembers => "getMembers",
            Request::Step { .. } => "step",
        }
    }
}

/// Totals over the frames advanced by one `Step` request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    /// Last frame simulated.
    pub frame: Frame,
    pub frames: u32,
    pub committed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Response {
    Ack,
    Stepped(StepSummary),
    Snapshot(Box<WorldSnapshot>),
    Stats(Box<EngineStats>),
    Members(Vec<MemberSummary>),
    Error { code: String, message: String },
}

impl Response {
    pub fn name(&self) -> &'static str {
        match self {
            Response::Ack => "ack",
            Response::Stepped(_) => "stepped",
            Response::Snapshot(_) => "snapshot",
            Response::Stats(_) => "stats",
            Response::Members(_) => "members",
            Response::Error { .. } => "error",
        }
    }
}

impl From<EngineError> for Response {
    fn from(err: EngineError) -> Self {
        Response::Error {
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: RequestId,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: RequestId,
    pub response: Response,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelopes_use_tagged_json() {
        let envelope = RequestEnvelope {
            id: 7,
            request: Request::Step { frames: 3 },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["request"]["type"], "step");
        assert_eq!(json["request"]["payload"]["frames"], 3);

        let back: RequestEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn engine_errors_keep_their_code() {
        let response = Response::from(EngineError::NotStarted);
        assert!(matches!(
            response,
            Response::Error { ref code, .. } if code == "ENGINE_NOT_STARTED"
        ));
    }
}
