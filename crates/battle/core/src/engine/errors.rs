//! Errors returned to callers of [`super::GameEngine`].

use crate::data::DataError;
use crate::error::{ErrorSeverity, SimError};
use crate::types::MemberId;

/// Lifecycle phase of an engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case")]
pub enum EngineState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EngineError {
    #[error("engine is not running (state: {0})")]
    NotRunning(EngineState),

    #[error("engine is not paused (state: {0})")]
    NotPaused(EngineState),

    #[error("engine is already started (state: {0})")]
    AlreadyStarted(EngineState),

    #[error("engine has not been started")]
    NotStarted,

    #[error("invalid battle data: {0}")]
    InvalidData(#[from] DataError),

    #[error("member {0} does not exist")]
    UnknownMember(MemberId),
}

impl SimError for EngineError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidData(_) | Self::UnknownMember(_) => ErrorSeverity::Validation,
            _ => ErrorSeverity::Lifecycle,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotRunning(_) => "ENGINE_NOT_RUNNING",
            Self::NotPaused(_) => "ENGINE_NOT_PAUSED",
            Self::AlreadyStarted(_) => "ENGINE_ALREADY_STARTED",
            Self::NotStarted => "ENGINE_NOT_STARTED",
            Self::InvalidData(_) => "ENGINE_INVALID_DATA",
            Self::UnknownMember(_) => "ENGINE_UNKNOWN_MEMBER",
        }
    }
}
