use crate::error::{ErrorSeverity, SimError};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FsmError {
    #[error("unknown skill `{0}`")]
    UnknownSkill(String),
}

impl SimError for FsmError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Content
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownSkill(_) => "FSM_UNKNOWN_SKILL",
        }
    }
}
