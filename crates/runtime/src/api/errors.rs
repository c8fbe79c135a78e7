//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, configuration and the engine
//! itself so clients can bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use super::protocol::RequestId;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("simulation worker command channel closed")]
    CommandChannelClosed,

    #[error("simulation worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("simulation worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    /// The engine rejected a request; `code` is its stable error code.
    #[error("{code}: {message}")]
    Engine { code: String, message: String },

    #[error("response {got} does not answer request {expected}")]
    CorrelationMismatch { expected: RequestId, got: RequestId },

    #[error("unexpected `{got}` response to a `{request}` request")]
    UnexpectedResponse {
        request: &'static str,
        got: &'static str,
    },

    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("snapshot encoding failed")]
    Encode(#[source] bincode::Error),
}
