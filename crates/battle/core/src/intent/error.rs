use crate::error::{ErrorSeverity, SimError};
use crate::pipeline::PipelineError;
use crate::stats::StatError;
use crate::types::MemberId;

/// Why an intent was skipped. Never aborts a commit.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum IntentError {
    #[error("member {0} does not exist")]
    MemberNotFound(MemberId),

    #[error("buff `{0}` is not active")]
    BuffNotActive(String),

    #[error(transparent)]
    Stat(#[from] StatError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl SimError for IntentError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::MemberNotFound(_) | Self::BuffNotActive(_) => ErrorSeverity::Validation,
            Self::Stat(e) => e.severity(),
            Self::Pipeline(e) => e.severity(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::MemberNotFound(_) => "INTENT_MEMBER_NOT_FOUND",
            Self::BuffNotActive(_) => "INTENT_BUFF_NOT_ACTIVE",
            Self::Stat(e) => e.error_code(),
            Self::Pipeline(e) => e.error_code(),
        }
    }
}
