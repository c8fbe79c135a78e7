use crate::error::{ErrorSeverity, SimError};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PipelineError {
    #[error("unknown pipeline `{0}`")]
    UnknownPipeline(String),

    #[error("pipeline `{pipeline}` has no stage `{anchor}` to insert after")]
    UnknownAnchor { pipeline: String, anchor: String },

    #[error("pipeline `{pipeline}` already has a stage `{stage}`")]
    DuplicateStage { pipeline: String, stage: String },

    #[error("stage `{stage}` needs a target but the context has none")]
    MissingTarget { stage: String },

    #[error("stage `{stage}` is invalid: {reason}")]
    InvalidStage { stage: String, reason: String },
}

impl SimError for PipelineError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownPipeline(_) | Self::UnknownAnchor { .. } | Self::DuplicateStage { .. } => {
                ErrorSeverity::Validation
            }
            Self::MissingTarget { .. } | Self::InvalidStage { .. } => ErrorSeverity::Content,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownPipeline(_) => "PIPELINE_UNKNOWN",
            Self::UnknownAnchor { .. } => "PIPELINE_UNKNOWN_ANCHOR",
            Self::DuplicateStage { .. } => "PIPELINE_DUPLICATE_STAGE",
            Self::MissingTarget { .. } => "PIPELINE_MISSING_TARGET",
            Self::InvalidStage { .. } => "PIPELINE_INVALID_STAGE",
        }
    }
}
